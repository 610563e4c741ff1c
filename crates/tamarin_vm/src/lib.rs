mod chunk;
mod compiler;
mod disassemble;
mod error;
mod native;
mod object;
mod opcode;
mod value;
mod vm;

pub use chunk::Chunk;
pub use disassemble::{disassemble_chunk, disassemble_instruction};
pub use error::{CompileError, RuntimeError};
pub use object::LoxFunction;
pub use opcode::Op;
pub use value::{Obj, Value};
pub use vm::Vm;

/// Compiles and runs a script from source, routing compile errors and
/// runtime errors through the same reporting path the CLI binary expects.
pub fn interpret(vm: &mut Vm, source: &str) -> InterpretResult {
    match compiler::compile(source) {
        Ok(function) => match vm.run(function) {
            Ok(()) => InterpretResult::Ok,
            Err(_) => InterpretResult::RuntimeError,
        },
        Err(_) => InterpretResult::CompileError,
    }
}

pub use vm::InterpretResult;

/// Compiles `source` without running it. Exposed for the `--disassemble`
/// CLI flag and for tests that check emitted bytecode shape directly.
pub fn compile(source: &str) -> Result<std::rc::Rc<LoxFunction>, CompileError> {
    compiler::compile(source)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(source: &str) -> InterpretResult {
        let mut vm = Vm::new();
        interpret(&mut vm, source)
    }

    #[test]
    fn e2e_arithmetic_and_print() {
        assert_eq!(run("print 1 + 2 * 3;"), InterpretResult::Ok);
    }

    #[test]
    fn e2e_variables_and_scopes() {
        let source = r#"
            var a = 1;
            {
                var a = 2;
                print a;
            }
            print a;
        "#;
        assert_eq!(run(source), InterpretResult::Ok);
    }

    #[test]
    fn e2e_control_flow() {
        let source = r#"
            var i = 0;
            while (i < 3) {
                print i;
                i = i + 1;
            }
        "#;
        assert_eq!(run(source), InterpretResult::Ok);
    }

    #[test]
    fn e2e_functions_and_recursion() {
        let source = r#"
            fun fib(n) {
                if (n < 2) return n;
                return fib(n - 1) + fib(n - 2);
            }
            print fib(10);
        "#;
        assert_eq!(run(source), InterpretResult::Ok);
    }

    #[test]
    fn e2e_closures_are_not_supported_but_plain_functions_are() {
        let source = r#"
            fun makeCounter() {
                var count = 0;
                return count;
            }
            print makeCounter();
        "#;
        assert_eq!(run(source), InterpretResult::Ok);
    }

    #[test]
    fn e2e_classes_and_methods() {
        let source = r#"
            class Greeter {
                greet(name) {
                    print "hi " + name;
                }
            }
            var g = Greeter();
            g.greet("world");
        "#;
        assert_eq!(run(source), InterpretResult::Ok);
    }

    #[test]
    fn e2e_inheritance_and_super() {
        let source = r#"
            class Animal {
                speak() {
                    print "...";
                }
            }
            class Dog < Animal {
                speak() {
                    super.speak();
                    print "woof";
                }
            }
            Dog().speak();
        "#;
        assert_eq!(run(source), InterpretResult::Ok);
    }

    #[test]
    fn e2e_runtime_type_error_reports_operands_must_be_numbers() {
        assert_eq!(run("1 + \"x\";"), InterpretResult::RuntimeError);
    }

    #[test]
    fn compile_error_on_unterminated_string() {
        assert_eq!(run("print \"oops;"), InterpretResult::CompileError);
    }

    #[test]
    fn compile_error_on_too_many_call_arguments() {
        let mut args = String::new();
        for i in 0..256 {
            if i > 0 {
                args.push(',');
            }
            args.push('1');
        }
        let source = format!("fun f() {{}}\nf({args});");
        assert_eq!(run(&source), InterpretResult::CompileError);
    }

    #[test]
    fn call_with_255_arguments_compiles_and_runs() {
        let mut params = String::new();
        let mut args = String::new();
        for i in 0..255 {
            if i > 0 {
                params.push(',');
                args.push(',');
            }
            params.push_str(&format!("p{i}"));
            args.push('1');
        }
        let source = format!("fun f({params}) {{ return p0; }}\nf({args});");
        assert_eq!(run(&source), InterpretResult::Ok);
    }

    #[test]
    fn constant_pool_switches_to_long_form_past_255_entries() {
        let mut source = String::new();
        for i in 0..300 {
            source.push_str(&format!("var v{i} = {i};\n"));
        }
        let function = compile(&source).expect("should compile");
        let disassembled = disassemble_chunk(&function.chunk, "script");
        assert!(disassembled.contains("OP_CONSTANT_LONG") || disassembled.contains("OP_DEFINE_GLOBAL_LONG"));
    }

    #[test]
    fn chunk_code_and_lines_stay_in_sync() {
        let function = compile("print 1 + 2;").unwrap();
        assert_eq!(function.chunk.code().len(), function.chunk.len());
    }

    #[test]
    fn value_equality_is_reflexive_except_for_nan() {
        assert_eq!(Value::Number(1.0), Value::Number(1.0));
        assert_ne!(Value::Number(f64::NAN), Value::Number(f64::NAN));
        assert_eq!(Value::Nil, Value::Nil);
        assert_ne!(Value::Bool(true), Value::Bool(false));
    }

    #[test]
    fn disassembly_byte_count_for_fib_is_stable() {
        let source = r#"
            fun fib(n) {
                if (n < 2) return n;
                return fib(n - 1) + fib(n - 2);
            }
        "#;
        let script = compile(source).unwrap();
        let fib = script
            .chunk
            .constants()
            .iter()
            .find_map(|v| match v {
                Value::Object(Obj::Function(f)) if f.name.as_deref() == Some("fib") => Some(f.clone()),
                _ => None,
            })
            .expect("fib should be compiled as a nested function constant");

        // Walking disassemble_instruction offset-by-offset must consume
        // exactly the bytes the compiler emitted, with nothing left over.
        let mut offset = 0;
        while offset < fib.chunk.len() {
            let (_, next) = disassemble_instruction(&fib.chunk, offset);
            assert!(next > offset, "disassembler made no progress at offset {offset}");
            offset = next;
        }
        assert_eq!(offset, fib.chunk.len());
    }

    #[test]
    fn undefined_variable_is_a_runtime_error() {
        assert_eq!(run("print nope;"), InterpretResult::RuntimeError);
    }

    #[test]
    fn calling_a_non_callable_is_a_runtime_error() {
        assert_eq!(run("var x = 1; x();"), InterpretResult::RuntimeError);
    }

    #[test]
    fn wrong_arity_is_a_runtime_error() {
        assert_eq!(run("fun f(a) { return a; } f();"), InterpretResult::RuntimeError);
    }

    #[test]
    fn property_access_on_non_instance_is_a_runtime_error() {
        assert_eq!(run("var x = 1; print x.y;"), InterpretResult::RuntimeError);
    }

    #[test]
    fn inheriting_from_a_non_class_is_a_runtime_error() {
        let source = "fun notClass() {}\nclass Bad < notClass {}\n";
        assert_eq!(run(source), InterpretResult::RuntimeError);
    }

    #[test]
    fn this_outside_class_is_a_compile_error() {
        assert_eq!(run("print this;"), InterpretResult::CompileError);
    }

    #[test]
    fn returning_a_value_from_an_initializer_is_a_compile_error() {
        let source = r#"
            class C {
                init() {
                    return 1;
                }
            }
        "#;
        assert_eq!(run(source), InterpretResult::CompileError);
    }
}
