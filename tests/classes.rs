mod common;

#[cfg(test)]
mod class_tests {
    use rill::diagnostics::{Collector, Phase};
    use rill::Outcome;

    use super::common::{run, run_ok, session_with_threshold};

    fn runtime_error(source: &str) -> String {
        let result = run(source);
        assert_eq!(result.outcome, Outcome::RuntimeError);
        assert_eq!(result.diagnostics.count(Phase::Runtime), 1);
        result.diagnostics.messages().remove(0)
    }

    const POINT: &str = "\
class Point {
  init(x, y) {
    self.x = x
    self.y = y
  }

  sum() {
    return self.x + self.y
  }
}
";

    #[test]
    fn test_textual_forms() {
        let source = format!("{POINT}print Point\nprint Point(1, 2)\nprint Point(1, 2).sum");
        assert_eq!(
            run_ok(&source),
            vec!["<class Point>", "<Point instance>", "<fn sum>"]
        );
    }

    #[test]
    fn test_initializer_and_fields() {
        let source = format!("{POINT}let p = Point(3, 4)\nprint p.x\nprint p.sum()");
        assert_eq!(run_ok(&source), vec!["3.0", "7.0"]);
    }

    #[test]
    fn test_fields_can_be_added_and_reassigned() {
        let source = format!("{POINT}let p = Point(1, 2)\np.z = p.x = 10\nprint p.z\nprint p.sum()");
        assert_eq!(run_ok(&source), vec!["10.0", "12.0"]);
    }

    #[test]
    fn test_initializer_returns_self() {
        let source = format!("{POINT}let p = Point(1, 2)\nprint p.init(5, 6) == p\nprint p.x");
        assert_eq!(run_ok(&source), vec!["true", "5.0"]);
    }

    #[test]
    fn test_bare_return_in_initializer_yields_the_instance() {
        let source = "\
class Guard {
  init(ok) {
    self.ok = ok
    if (!ok) {
      return
    }
    self.checked = true
  }
}
let g = Guard(false)
print g
print g.ok";
        assert_eq!(run_ok(source), vec!["<Guard instance>", "false"]);
    }

    #[test]
    fn test_class_without_initializer() {
        assert_eq!(
            run_ok("class Empty {\n}\nprint Empty(1, 2, 3)"),
            vec!["<Empty instance>"]
        );
    }

    #[test]
    fn test_bound_methods_remember_their_instance() {
        let source = format!(
            "{POINT}let a = Point(1, 1)\nlet b = Point(2, 2)\nlet f = a.sum\nlet g = b.sum\nprint f()\nprint g()"
        );
        assert_eq!(run_ok(&source), vec!["2.0", "4.0"]);
    }

    #[test]
    fn test_fields_shadow_methods() {
        let source = format!("{POINT}let p = Point(1, 2)\np.sum = \"field\"\nprint p.sum");
        assert_eq!(run_ok(&source), vec!["field"]);
    }

    #[test]
    fn test_self_in_nested_closure() {
        let source = "\
class Counter {
  init() {
    self.n = 0
  }

  incrementer() {
    fn step() {
      self.n = self.n + 1
      return self.n
    }
    return step
  }
}
let c = Counter()
let step = c.incrementer()
step()
print step()
print c.n";
        assert_eq!(run_ok(source), vec!["2.0", "2.0"]);
    }

    #[test]
    fn test_inherited_methods() {
        let source = "\
class Animal {
  speak() {
    return self.name + \" makes a sound\"
  }
}
class Dog < Animal {
  init(name) {
    self.name = name
  }
}
print Dog(\"Rex\").speak()";
        assert_eq!(run_ok(source), vec!["Rex makes a sound"]);
    }

    #[test]
    fn test_overrides_and_super_calls() {
        let source = "\
class Base {
  init(a) {
    self.a = a
  }

  describe() {
    return \"base \" + self.a
  }
}
class Derived < Base {
  init(a, b) {
    super.init(a)
    self.b = b
  }

  describe() {
    return super.describe() + \" derived \" + self.b
  }
}
print Derived(1, 2).describe()";
        assert_eq!(run_ok(source), vec!["base 1.0 derived 2.0"]);
    }

    #[test]
    fn test_super_is_bound_statically() {
        let source = "\
class A {
  method() {
    print \"A method\"
  }
}
class B < A {
  method() {
    print \"B method\"
  }

  test() {
    super.method()
  }
}
class C < B {
}
C().test()";
        assert_eq!(run_ok(source), vec!["A method"]);
    }

    #[test]
    fn test_super_method_sees_overrides_through_self() {
        let source = "\
class A {
  greet() {
    return \"hello \" + self.name()
  }

  name() {
    return \"a\"
  }
}
class B < A {
  name() {
    return \"b\"
  }

  greet() {
    return super.greet()
  }
}
print B().greet()";
        assert_eq!(run_ok(source), vec!["hello b"]);
    }

    #[test]
    fn test_methods_can_refer_to_their_class() {
        let source = "\
class Node {
  init(next) {
    self.next = next
  }

  push() {
    return Node(self)
  }
}
let list = Node(nil).push().push()
print list.next.next.next";
        assert_eq!(run_ok(source), vec!["nil"]);
    }

    #[test]
    fn test_instances_compare_by_identity() {
        let source = format!("{POINT}let p = Point(1, 2)\nlet q = Point(1, 2)\nprint p == p\nprint p == q");
        assert_eq!(run_ok(&source), vec!["true", "false"]);
    }

    #[test]
    fn test_undefined_property() {
        let source = format!("{POINT}print Point(1, 2).nope");
        assert_eq!(
            runtime_error(&source),
            "UndefinedPropertyError: Undefined property 'nope'."
        );
    }

    #[test]
    fn test_undefined_super_method() {
        let source = "\
class A {
}
class B < A {
  m() {
    return super.missing()
  }
}
B().m()";
        assert_eq!(
            runtime_error(source),
            "UndefinedPropertyError: Undefined property 'missing'."
        );
    }

    #[test]
    fn test_property_access_on_non_instances() {
        assert!(runtime_error("let s = \"str\"\nprint s.len").starts_with("TypeError:"));
        assert!(runtime_error("let n = 1\nn.x = 2").starts_with("TypeError:"));
        assert!(runtime_error("class A {\n}\nA.x = 1").starts_with("TypeError:"));
    }

    #[test]
    fn test_superclass_must_be_a_class() {
        let message = runtime_error("let NotClass = \"x\"\nclass B < NotClass {\n}");
        assert!(message.starts_with("NotAClassError:"), "{}", message);
    }

    #[test]
    fn test_self_survives_collection() {
        let source = format!(
            "{POINT}let keep = Point(5, 6).sum\nfor (let i = 0; i < 2000; i = i + 1) {{\n  Point(i, i).sum()\n}}\nprint keep()"
        );
        assert_eq!(run_ok(&source), vec!["11.0"]);
    }

    #[test]
    fn test_self_referencing_instances_survive_collection() {
        let (mut session, buf) = session_with_threshold(16);
        let mut diagnostics = Collector::new();

        let source = "\
class Node {
  link(other) {
    self.next = other
    other.prev = self
  }
}
let a = Node()
let b = Node()
a.me = a
a.link(b)
b.link(a)
for (let i = 0; i < 500; i = i + 1) {
  a.link(b)
}
print a.me.me == a
print a.next.next == a
print b.prev.prev == b";
        assert_eq!(session.run(source, &mut diagnostics), Outcome::Completed);
        assert_eq!(buf.lines(), vec!["true", "true", "true"]);
        assert!(session.interpreter().environments().peak() < 32);
    }
}
