#[cfg(test)]
mod tests {
    use crate::compile::Compiler;
    use crate::logging::capture;
    use crate::registry::DirectiveRegistry;
    use crate::scope::Scope;
    use crate::value::Value;
    use serde_json::json;
    use tracing::Level;

    fn scope() -> Scope {
        Scope::from_json(json!({
            "test": "test",
            "test1": "test1",
            "test2": "test2",
            "test4": { "test": "test4" },
            "test5": 20,
            "test6": 5
        }))
    }

    /// Renders with an empty registry, which always completes synchronously.
    fn render(template: &str, scope: &Scope) -> String {
        let registry = DirectiveRegistry::new();
        Compiler::new(&registry)
            .compile(template)
            .render(scope)
            .into_ready()
            .unwrap()
    }

    #[test]
    fn test_no_listeners() {
        assert_eq!(render("test", &scope()), "test");
    }

    #[test]
    fn test_listener_with_no_matches() {
        let (out, events) = capture(|| render("{{{test3}}}", &scope()));
        assert_eq!(out, "");
        assert_eq!(
            events.iter().filter(|(level, _)| *level == Level::WARN).count(),
            1
        );
    }

    #[test]
    fn test_single_and_multiple_listeners() {
        assert_eq!(render("{{{test}}}", &scope()), "test");
        assert_eq!(
            render("{{{test}}} {{{test1}}} {{{test2}}}", &scope()),
            "test test1 test2"
        );
    }

    #[test]
    fn test_deep_listeners() {
        assert_eq!(render("{{{test4.test}}}", &scope()), "test4");
    }

    #[test]
    fn test_abnormal_spacing() {
        assert_eq!(render("{{{       test       }}}", &scope()), "test");
        assert_eq!(render("        {{{    test4.    test     }}}", &scope()), "test4");
    }

    #[test]
    fn test_functional_expressions() {
        assert_eq!(
            render("{{{test4.test.indexOf('test1') > -1}}}", &scope()),
            "false"
        );
        assert_eq!(
            render("{{{[ test, test1 ].join(' & ')}}}", &scope()),
            "test &amp; test1"
        );
        assert_eq!(render("{{{test.toUpperCase()}}}", &scope()), "TEST");
    }

    #[test]
    fn test_binary_expressions() {
        assert_eq!(render("{{{test5}}}", &scope()), "20");
        assert_eq!(render("{{{test5 * test6}}}", &scope()), "100");
        assert_eq!(render("{{{test5 / test6}}}", &scope()), "4");
        assert_eq!(render("{{{test5 + test6}}}", &scope()), "25");
        assert_eq!(render("{{{test5 - test6}}}", &scope()), "15");
        assert_eq!(render("{{{(test5 + test6) * test6}}}", &scope()), "125");
        assert_eq!(render("{{{5 * 4}}}", &scope()), "20");
        assert_eq!(render("{{{(5+4)*4}}}", &scope()), "36");
    }

    #[test]
    fn test_division_by_zero() {
        assert_eq!(render("{{{5/0}}}", &scope()), "Infinity");
        assert_eq!(render("{{{0/0}}}", &scope()), "NaN");
    }

    #[test]
    fn test_callable_scope_members() {
        let scope = scope().with_function("format.money", |args| {
            let amount = args.first().map_or(0.0, Value::to_number);
            Value::String(format!("${:.2}", amount))
        });
        assert_eq!(render("{{{format.money(test5 / 3)}}}", &scope), "$6.67");
    }

    #[test]
    fn test_one_warning_per_failed_marker() {
        let (out, events) = capture(|| {
            render("{{{nope}}}|{{{test.nope()}}}|{{{test +}}}|{{{test}}}", &scope())
        });
        assert_eq!(out, "|||test");
        assert_eq!(
            events.iter().filter(|(level, _)| *level == Level::WARN).count(),
            3
        );
    }
}
