mod common;

#[cfg(test)]
mod interpreter_tests {
    use rill::diagnostics::{Collector, Phase};
    use rill::environment::Environments;
    use rill::interpreter::Interpreter;
    use rill::value::Value;
    use rill::{Outcome, Session};

    use super::common::{run, run_ok, session, session_with_threshold, SharedBuf};

    fn runtime_error(source: &str) -> String {
        let result = run(source);
        assert_eq!(result.outcome, Outcome::RuntimeError);
        assert_eq!(result.diagnostics.count(Phase::Runtime), 1);
        result.diagnostics.messages().remove(0)
    }

    #[test]
    fn test_arithmetic_and_number_format() {
        assert_eq!(run_ok("print 1 + 2 * 3"), vec!["7.0"]);
        assert_eq!(run_ok("print (1 + 2) * 3"), vec!["9.0"]);
        assert_eq!(run_ok("print 10 - 2 - 3"), vec!["5.0"]);
        assert_eq!(run_ok("print 7 / 2"), vec!["3.5"]);
        assert_eq!(run_ok("print -(3 - 5)"), vec!["2.0"]);
    }

    #[test]
    fn test_division_by_zero_follows_ieee() {
        assert_eq!(run_ok("print 1 / 0\nprint -1 / 0"), vec!["inf", "-inf"]);
        assert_eq!(run_ok("print 0 / 0"), vec!["NaN"]);
        assert_eq!(run_ok("let n = 0 / 0\nprint n == n"), vec!["false"]);
    }

    #[test]
    fn test_comparison_and_equality() {
        assert_eq!(
            run_ok("print 1 < 2\nprint 2 <= 1\nprint 3 >= 3\nprint 1 > 2"),
            vec!["true", "false", "true", "false"]
        );
        assert_eq!(
            run_ok("print nil == nil\nprint 1 == \"1\"\nprint \"a\" != \"b\"\nprint true == true"),
            vec!["true", "false", "true", "true"]
        );
    }

    #[test]
    fn test_truthiness() {
        let source = "\
if (0) { print \"zero\" } else { print \"no\" }
if (\"\") { print \"empty\" }
if (nil) { print \"nil\" } else { print \"falsy\" }
print !nil
print !0
print !false";
        assert_eq!(
            run_ok(source),
            vec!["zero", "empty", "falsy", "true", "false", "true"]
        );
    }

    #[test]
    fn test_logical_operators_short_circuit() {
        let source = "\
fn boom() {
  print \"evaluated\"
  return true
}
print nil or \"fallback\"
print 1 or boom()
print false and boom()
print 1 and 2";
        assert_eq!(run_ok(source), vec!["fallback", "1.0", "false", "2.0"]);
    }

    #[test]
    fn test_string_concatenation() {
        assert_eq!(run_ok("print \"foo\" + \"bar\""), vec!["foobar"]);
        assert_eq!(run_ok("print \"n=\" + 1"), vec!["n=1.0"]);
        assert_eq!(run_ok("print \"b=\" + true + nil"), vec!["b=truenil"]);
    }

    #[test]
    fn test_number_plus_string_is_a_type_error() {
        let message = runtime_error("print 1 + \"a\"");
        assert!(message.starts_with("TypeError:"), "{}", message);
    }

    #[test]
    fn test_arithmetic_type_errors() {
        assert!(runtime_error("print -\"a\"").starts_with("TypeError:"));
        assert!(runtime_error("print 1 < \"2\"").starts_with("TypeError:"));
        assert!(runtime_error("print nil * 2").starts_with("TypeError:"));
    }

    #[test]
    fn test_block_scoping_and_shadowing() {
        let source = "\
let a = \"global\"
{
  let a = \"outer\"
  {
    let a = \"inner\"
    print a
  }
  print a
}
print a";
        assert_eq!(run_ok(source), vec!["inner", "outer", "global"]);
    }

    #[test]
    fn test_block_variables_end_with_the_block() {
        let message = runtime_error("{\n  let inner = 1\n}\nprint inner");
        assert_eq!(message, "UndefinedVariableError: Undefined variable 'inner'.");
    }

    #[test]
    fn test_assignment_updates_enclosing_scope() {
        let source = "\
let a = 1
{
  a = a + 1
  let b = a = 10
  print b
}
print a";
        assert_eq!(run_ok(source), vec!["10.0", "10.0"]);
    }

    #[test]
    fn test_undefined_variable() {
        assert_eq!(
            runtime_error("print x"),
            "UndefinedVariableError: Undefined variable 'x'."
        );
        assert_eq!(
            runtime_error("y = 1"),
            "UndefinedVariableError: Undefined variable 'y'."
        );
    }

    #[test]
    fn test_runtime_error_carries_the_line() {
        let result = run("print 1\n\nprint missing");
        assert_eq!(result.output, vec!["1.0"]);
        assert_eq!(result.diagnostics.diagnostics[0].line, Some(3));
    }

    #[test]
    fn test_if_else_chain() {
        let source = "\
fn classify(n) {
  if (n < 0) {
    return \"negative\"
  } else if (n == 0) {
    return \"zero\"
  } else {
    return \"positive\"
  }
}
print classify(-2)
print classify(0)
print classify(5)";
        assert_eq!(run_ok(source), vec!["negative", "zero", "positive"]);
    }

    #[test]
    fn test_for_loop() {
        let source = "\
let sum = 0
for (let i = 1; i <= 4; i = i + 1) {
  sum = sum + i
}
print sum";
        assert_eq!(run_ok(source), vec!["10.0"]);
    }

    #[test]
    fn test_for_loop_variable_is_scoped_to_the_loop() {
        let message = runtime_error("for (let i = 0; i < 1; i = i + 1) {\n}\nprint i");
        assert_eq!(message, "UndefinedVariableError: Undefined variable 'i'.");
    }

    #[test]
    fn test_return_exits_loop_and_function() {
        let source = "\
fn first_over(limit) {
  for (let i = 0; i < 100; i = i + 1) {
    if (i * i > limit) {
      return i
    }
  }
  return nil
}
print first_over(10)";
        assert_eq!(run_ok(source), vec!["4.0"]);
    }

    #[test]
    fn test_recursion() {
        let source = "\
fn fib(n) {
  if (n < 2) {
    return n
  }
  return fib(n - 1) + fib(n - 2)
}
print fib(15)";
        assert_eq!(run_ok(source), vec!["610.0"]);
    }

    #[test]
    fn test_function_without_return_yields_nil() {
        assert_eq!(run_ok("fn f() {\n  let a = 1\n}\nprint f()"), vec!["nil"]);
    }

    #[test]
    fn test_arity_is_lenient() {
        let source = "\
fn pair(a, b) {
  print a
  print b
}
pair(1)
pair(1, 2, 3)";
        assert_eq!(run_ok(source), vec!["1.0", "nil", "1.0", "2.0"]);
    }

    #[test]
    fn test_calling_a_non_callable() {
        let message = runtime_error("let x = 1\nx()");
        assert!(message.starts_with("TypeError:"), "{}", message);
    }

    #[test]
    fn test_callee_checked_before_arguments() {
        let result = run("fn side() {\n  print \"side\"\n}\n\"text\"(side())");
        assert_eq!(result.outcome, Outcome::RuntimeError);
        assert!(result.output.is_empty());
    }

    #[test]
    fn test_closures_keep_their_environment() {
        let source = "\
fn make_counter() {
  let count = 0
  fn increment() {
    count = count + 1
    return count
  }
  return increment
}
let a = make_counter()
let b = make_counter()
print a()
print a()
print b()";
        assert_eq!(run_ok(source), vec!["1.0", "2.0", "1.0"]);
    }

    #[test]
    fn test_closure_binding_is_static() {
        let source = "\
let a = \"global\"
{
  fn show() {
    print a
  }
  show()
  let a = \"block\"
  show()
}";
        assert_eq!(run_ok(source), vec!["global", "global"]);
    }

    #[test]
    fn test_each_iteration_gets_a_fresh_body_scope() {
        let source = "\
let fns = nil
let first = nil
for (let i = 0; i < 2; i = i + 1) {
  let j = i
  fn get() {
    return j
  }
  if (first == nil) {
    first = get
  }
  fns = get
}
print first()
print fns()";
        assert_eq!(run_ok(source), vec!["0.0", "1.0"]);
    }

    #[test]
    fn test_function_values_print() {
        assert_eq!(
            run_ok("fn f() {\n}\nprint f\nprint time"),
            vec!["<fn f>", "<native fn time>"]
        );
    }

    #[test]
    fn test_native_time() {
        let output = run_ok("let t = time()\nprint t > 0\nprint time() >= t");
        assert_eq!(output, vec!["true", "true"]);
    }

    #[test]
    fn test_static_errors_prevent_execution() {
        let result = run("print \"before\"\nreturn 1");
        assert_eq!(result.outcome, Outcome::StaticError);
        assert!(result.output.is_empty());
        assert_eq!(result.diagnostics.count(Phase::Static), 1);
    }

    #[test]
    fn test_lex_errors_prevent_execution() {
        let result = run("print 1\nprint @");
        assert_eq!(result.outcome, Outcome::StaticError);
        assert!(result.output.is_empty());
        assert_eq!(
            result.diagnostics.messages(),
            vec!["Error: Unexpected character: @"]
        );
    }

    #[test]
    fn test_output_before_a_fault_is_kept() {
        let result = run("print 1\nprint nope\nprint 2");
        assert_eq!(result.outcome, Outcome::RuntimeError);
        assert_eq!(result.output, vec!["1.0"]);
    }

    #[test]
    fn test_session_keeps_globals_across_runs() {
        let (mut session, buf) = session();
        let mut diagnostics = Collector::new();

        assert_eq!(
            session.run("let a = 1\nfn inc() {\n  a = a + 1\n}", &mut diagnostics),
            Outcome::Completed
        );
        assert_eq!(
            session.run("inc()\nprint undefined_name", &mut diagnostics),
            Outcome::RuntimeError
        );
        assert_eq!(
            session.run("inc()\nprint a", &mut diagnostics),
            Outcome::Completed
        );

        assert_eq!(buf.lines(), vec!["3.0"]);
        assert_eq!(session.interpreter().global("a"), Some(Value::Number(3.0)));
    }

    #[test]
    fn test_session_evaluate() {
        let (mut session, _) = session();
        let mut diagnostics = Collector::new();

        assert_eq!(
            session.evaluate("(1 + 2) * 3", &mut diagnostics),
            Ok(Value::Number(9.0))
        );
        assert_eq!(
            session.evaluate("\"a\" + \"b\"", &mut diagnostics),
            Ok(Value::String("ab".to_string()))
        );
        assert_eq!(
            session.evaluate("\"a\" + \"b\"", &mut diagnostics),
            Ok(Value::String("ab".to_string()))
        );
        assert_eq!(
            session.evaluate("nope", &mut diagnostics),
            Err(Outcome::RuntimeError)
        );
        assert_eq!(
            session.evaluate("1 +", &mut diagnostics),
            Err(Outcome::StaticError)
        );
    }

    #[test]
    fn test_uncaptured_scopes_are_released_eagerly() {
        let (mut session, _) = session();
        let mut diagnostics = Collector::new();

        let source = "\
fn work(n) {
  let total = 0
  for (let i = 0; i < n; i = i + 1) {
    {
      total = total + i
    }
  }
  return total
}
print work(200)";
        assert_eq!(session.run(source, &mut diagnostics), Outcome::Completed);
        // only the globals remain
        assert_eq!(session.interpreter().environments().live(), 1);
    }

    #[test]
    fn test_captured_scopes_are_collected() {
        let buf = SharedBuf::default();
        let interpreter =
            Interpreter::with_environments(Box::new(buf.clone()), Environments::with_threshold(16));
        let mut session = Session::with_interpreter(interpreter);
        let mut diagnostics = Collector::new();

        // Every call leaves a captured scope behind; none stays reachable.
        let source = "\
fn make(n) {
  fn get() {
    return n
  }
  return get
}
for (let i = 0; i < 100; i = i + 1) {
  make(i)
}
let keep = make(42)
print keep()";
        assert_eq!(session.run(source, &mut diagnostics), Outcome::Completed);
        assert_eq!(buf.lines(), vec!["42.0"]);
        assert!(session.interpreter().environments().live() < 16);

        assert_eq!(session.run("print keep()", &mut diagnostics), Outcome::Completed);
        assert_eq!(buf.lines(), vec!["42.0", "42.0"]);
    }

    #[test]
    fn test_garbage_is_collected_inside_a_long_running_call() {
        let (mut session, buf) = session_with_threshold(64);
        let mut diagnostics = Collector::new();

        // Each call binds a fresh method scope; the loop never returns to
        // the top level until it is done.
        let source = "\
class Counter {
  init() {
    self.n = 0
  }

  bump() {
    self.n = self.n + 1
  }
}
fn main() {
  let c = Counter()
  for (let i = 0; i < 5000; i = i + 1) {
    c.bump()
  }
  return c.n
}
print main()";
        assert_eq!(session.run(source, &mut diagnostics), Outcome::Completed);
        assert_eq!(buf.lines(), vec!["5000.0"]);
        assert!(session.interpreter().environments().peak() < 128);
    }

    #[test]
    fn test_closures_made_in_a_loop_are_collected() {
        let (mut session, buf) = session_with_threshold(64);
        let mut diagnostics = Collector::new();

        let source = "\
fn main() {
  let last = nil
  for (let i = 0; i < 3000; i = i + 1) {
    let j = i
    fn get() {
      return j
    }
    last = get
  }
  return last()
}
print main()";
        assert_eq!(session.run(source, &mut diagnostics), Outcome::Completed);
        assert_eq!(buf.lines(), vec!["2999.0"]);
        assert!(session.interpreter().environments().peak() < 128);
    }

    #[test]
    fn test_evaluated_arguments_survive_collection() {
        let (mut session, buf) = session_with_threshold(16);
        let mut diagnostics = Collector::new();

        // make(7) is only held by the pending call while churn() runs.
        let source = "\
fn make(n) {
  fn get() {
    return n
  }
  return get
}
fn churn() {
  for (let i = 0; i < 500; i = i + 1) {
    make(i)
  }
  return 0
}
fn apply(f, ignored) {
  return f()
}
print apply(make(7), churn())
print make(1)() + churn()";
        assert_eq!(session.run(source, &mut diagnostics), Outcome::Completed);
        assert_eq!(buf.lines(), vec!["7.0", "1.0"]);
    }

    #[test]
    fn test_top_level_distances_are_dropped_after_the_run() {
        let (mut session, _) = session();
        let mut diagnostics = Collector::new();

        for _ in 0..50 {
            let outcome = session.run("{\n  let a = 1\n  print a\n}", &mut diagnostics);
            assert_eq!(outcome, Outcome::Completed);
        }
        assert_eq!(session.interpreter().locals().len(), 0);

        // Function bodies can be called again later, so theirs stay.
        let source = "fn f() {\n  let a = 1\n  return a\n}";
        assert_eq!(session.run(source, &mut diagnostics), Outcome::Completed);
        assert_eq!(session.interpreter().locals().len(), 1);

        assert_eq!(session.run("print f()", &mut diagnostics), Outcome::Completed);
    }
}
