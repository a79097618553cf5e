#[cfg(test)]
mod tests {
    use crate::directive::{Directive, Link, LinkFuture, Restrict};
    use crate::dom::Element;
    use crate::error::LinkError;
    use crate::loader::TemplateCache;
    use crate::logging::capture;
    use crate::registry::DirectiveRegistry;
    use crate::scope::Scope;
    use crate::compile::MAX_DIRECTIVE_DEPTH;
    use crate::{CompilerConfig, Compiler};
    use futures::channel::oneshot;
    use futures::executor::block_on;
    use std::sync::{Arc, Mutex};
    use tracing::Level;

    fn set_test_attr(_: &Scope, el: &mut Element) -> Result<(), LinkError> {
        el.set_attr("test", "test");
        Ok(())
    }

    fn test_dir(restrict: Restrict) -> Directive {
        Directive::new(restrict)
            .with_controller("test")
            .with_link_fn(set_test_attr)
    }

    fn registry_with(directive: Directive) -> DirectiveRegistry {
        let mut registry = DirectiveRegistry::new();
        registry.register("testDir", directive).unwrap();
        registry
    }

    fn render(registry: &DirectiveRegistry, template: &str, scope: &Scope) -> String {
        let render = Compiler::new(registry).compile(template);
        block_on(async { render.render(scope).await })
    }

    #[test]
    fn test_attribute_unmatched_directive() {
        let registry = registry_with(test_dir(Restrict::Class));
        assert_eq!(
            render(&registry, "<div test-dir></div>", &Scope::new()),
            r#"<div test-dir=""></div>"#
        );
    }

    #[test]
    fn test_attribute_matched_directive() {
        let registry = registry_with(test_dir(Restrict::Attribute));
        assert_eq!(
            render(&registry, "<div test-dir></div>", &Scope::new()),
            r#"<div test-dir="" test="test"></div>"#
        );
    }

    #[test]
    fn test_element_matched_directive() {
        let registry = registry_with(test_dir(Restrict::Element));
        assert_eq!(
            render(&registry, "<test-dir></test-dir>", &Scope::new()),
            r#"<test-dir test="test"></test-dir>"#
        );
    }

    #[test]
    fn test_class_matched_directive() {
        let registry = registry_with(test_dir(Restrict::Class));
        assert_eq!(
            render(&registry, r#"<div class="testDir"></div>"#, &Scope::new()),
            r#"<div class="testDir" test="test"></div>"#
        );
    }

    #[test]
    fn test_entire_matched_document() {
        let registry = registry_with(test_dir(Restrict::Class));
        let template = concat!(
            "<!DOCTYPE html><html><head></head><body><div class=\"testDir\"></div>",
            "</body></html>"
        );
        assert_eq!(
            render(&registry, template, &Scope::new()),
            concat!(
                "<!DOCTYPE html>\n<html><head></head><body>",
                "<div class=\"testDir\" test=\"test\"></div></body></html>"
            )
        );
    }

    #[test]
    fn test_nested_matches_in_document_order() {
        let registry = registry_with(test_dir(Restrict::Class));
        let template = r#"<ul><li class="testDir">a</li><li>b</li><li class="testDir"><span class="testDir">c</span></li></ul>"#;
        assert_eq!(
            render(&registry, template, &Scope::new()),
            r#"<ul><li class="testDir" test="test">a</li><li>b</li><li class="testDir" test="test"><span class="testDir" test="test">c</span></li></ul>"#
        );
    }

    #[test]
    fn test_directive_replace() {
        let registry = registry_with(
            Directive::new(Restrict::Class)
                .with_replace(true)
                .with_link_fn(|_, el: &mut Element| {
                    el.set_inner_html("blah");
                    Ok(())
                }),
        );
        assert_eq!(
            render(&registry, r#"<div class="testDir"></div>"#, &Scope::new()),
            "blah"
        );
    }

    #[test]
    fn test_replaced_content_is_still_compiled() {
        let mut registry = registry_with(
            Directive::new(Restrict::Class)
                .with_replace(true)
                .with_template(r#"<b class="inner">{{{test}}}</b>"#),
        );
        registry
            .register("inner", test_dir(Restrict::Class))
            .unwrap();

        let scope = Scope::new().with("test", "x");
        assert_eq!(
            render(&registry, r#"<section><div class="testDir"></div></section>"#, &scope),
            r#"<section><b class="inner" test="test">x</b></section>"#
        );
    }

    #[test]
    fn test_no_directive_link_function() {
        let registry = registry_with(Directive::new(Restrict::Class).with_controller("test"));
        assert_eq!(
            render(&registry, r#"<div class="testDir"></div>"#, &Scope::new()),
            r#"<div class="testDir"></div>"#
        );
    }

    #[test]
    fn test_directive_template() {
        let registry = registry_with(Directive::new(Restrict::Class).with_template("blah"));
        assert_eq!(
            render(&registry, r#"<div class="testDir"></div>"#, &Scope::new()),
            r#"<div class="testDir">blah</div>"#
        );
    }

    #[test]
    fn test_directive_template_with_prepend() {
        let registry = registry_with(
            Directive::new(Restrict::Class)
                .with_template("blah")
                .with_prepend(true),
        );
        assert_eq!(
            render(&registry, r#"<div class="testDir">test</div>"#, &Scope::new()),
            r#"<div class="testDir">blahtest</div>"#
        );
    }

    #[test]
    fn test_directive_template_with_parser() {
        let registry = registry_with(Directive::new(Restrict::Class).with_template("{{{test}}}"));
        assert_eq!(
            render(
                &registry,
                r#"<div class="testDir"></div>"#,
                &Scope::new().with("test", "test")
            ),
            r#"<div class="testDir">test</div>"#
        );
    }

    #[test]
    fn test_prepend_with_scope_value() {
        let registry = registry_with(
            Directive::new(Restrict::Class)
                .with_template("{{{test}}}")
                .with_prepend(true),
        );
        assert_eq!(
            render(
                &registry,
                r#"<div class="testDir">existing</div>"#,
                &Scope::new().with("test", "new")
            ),
            r#"<div class="testDir">newexisting</div>"#
        );
    }

    #[test]
    fn test_directive_template_path_without_html() {
        let cache = TemplateCache::new();
        cache.put("test", "should not be used");
        let registry = registry_with(Directive::new(Restrict::Class).with_template_path("test"));

        let render = Compiler::new(&registry)
            .with_loader(&cache)
            .compile(r#"<div class="testDir"></div>"#);
        assert_eq!(
            block_on(async { render.render(&Scope::new()).await }),
            r#"<div class="testDir"></div>"#
        );
    }

    #[test]
    fn test_directive_template_path_html() {
        let cache = TemplateCache::new();
        cache.put("html/testDirectiveTemplatePath.html", "{{{test}}}");
        let registry = registry_with(
            Directive::new(Restrict::Class).with_template_path("html/testDirectiveTemplatePath.html"),
        );

        let render = Compiler::new(&registry)
            .with_loader(&cache)
            .compile(r#"<div class="testDir"></div>"#);
        let scope = Scope::new().with("test", "test");
        assert_eq!(
            block_on(async { render.render(&scope).await }),
            r#"<div class="testDir">test</div>"#
        );
    }

    #[test]
    fn test_template_path_without_loader_keeps_node() {
        let registry = registry_with(
            Directive::new(Restrict::Class).with_template_path("anything.html"),
        );
        let (out, events) = capture(|| {
            render(&registry, r#"<div class="testDir">kept</div>"#, &Scope::new())
        });
        assert_eq!(out, r#"<div class="testDir">kept</div>"#);
        assert_eq!(
            events.iter().filter(|(level, _)| *level == Level::WARN).count(),
            1
        );
    }

    #[test]
    fn test_priority_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut registry = DirectiveRegistry::new();
        for (name, priority) in [("five", 5), ("ten", 10), ("one", 1)] {
            let order = order.clone();
            registry
                .register(
                    name,
                    Directive::new(Restrict::Class)
                        .with_priority(priority)
                        .with_link_fn(move |_, _: &mut Element| {
                            order.lock().unwrap().push(priority);
                            Ok(())
                        }),
                )
                .unwrap();
        }

        render(&registry, r#"<i class="one five ten"></i>"#, &Scope::new());
        assert_eq!(*order.lock().unwrap(), [10, 5, 1]);
    }

    #[test]
    fn test_unregistered_directive_no_longer_applies() {
        let mut registry = registry_with(test_dir(Restrict::Class));
        assert_eq!(
            render(&registry, r#"<div class="testDir"></div>"#, &Scope::new()),
            r#"<div class="testDir" test="test"></div>"#
        );

        registry.unregister("testDir");
        registry
            .register("other", Directive::new(Restrict::Element))
            .unwrap();
        assert_eq!(
            render(&registry, r#"<div class="testDir"></div>"#, &Scope::new()),
            r#"<div class="testDir"></div>"#
        );
    }

    #[test]
    fn test_failing_link_is_isolated() {
        let mut registry = registry_with(test_dir(Restrict::Class));
        registry
            .register(
                "broken",
                Directive::new(Restrict::Class)
                    .with_priority(1)
                    .with_template("lost")
                    .with_link_fn(|_, _: &mut Element| Err(LinkError::new("link exploded"))),
            )
            .unwrap();

        let template = r#"<div class="broken testDir">keep</div><p class="testDir"></p>"#;
        let (out, events) = capture(|| render(&registry, template, &Scope::new()));

        assert_eq!(
            out,
            r#"<div class="broken testDir" test="test">keep</div><p class="testDir" test="test"></p>"#
        );
        let errors: Vec<_> = events
            .iter()
            .filter(|(level, _)| *level == Level::ERROR)
            .collect();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].1.contains("link exploded"));
        assert!(errors[0].1.contains("broken"));
    }

    #[test]
    fn test_config_directives_render() {
        let config = CompilerConfig::from_json(
            r#"{ "directives": {
                "greeting": { "restrict": "E", "template": "Hi {{{name}}}", "replace": true },
                "banner": { "restrict": "C", "template": "<b>!</b>", "prepend": true }
            } }"#,
        )
        .unwrap();
        let mut registry = DirectiveRegistry::new();
        assert_eq!(config.register_directives(&mut registry).unwrap(), 2);

        let scope = Scope::new().with("name", "Ann & co");
        assert_eq!(
            render(
                &registry,
                r#"<p class="banner"><greeting></greeting></p>"#,
                &scope
            ),
            r#"<p class="banner"><b>!</b>Hi Ann &amp; co</p>"#
        );
    }

    /// Completes only after the paired [`Signal`] has fired.
    struct WaitFor {
        rx: Mutex<Option<oneshot::Receiver<&'static str>>>,
        completed: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Link for WaitFor {
        fn link<'a>(&'a self, _: &'a Scope, element: &'a mut Element) -> LinkFuture<'a> {
            let rx = self.rx.lock().unwrap().take();
            Box::pin(async move {
                let rx = rx.ok_or_else(|| LinkError::new("already linked"))?;
                let value = rx.await.map_err(|_| LinkError::new("signal dropped"))?;
                element.set_attr("got", value);
                self.completed.lock().unwrap().push("waiter");
                Ok(())
            })
        }
    }

    struct Signal {
        tx: Mutex<Option<oneshot::Sender<&'static str>>>,
        completed: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Link for Signal {
        fn link<'a>(&'a self, _: &'a Scope, element: &'a mut Element) -> LinkFuture<'a> {
            let tx = self.tx.lock().unwrap().take();
            Box::pin(async move {
                if let Some(tx) = tx {
                    let _ = tx.send("late");
                }
                element.set_attr("sent", "yes");
                self.completed.lock().unwrap().push("signaller");
                Ok(())
            })
        }
    }

    #[test]
    fn test_out_of_order_completion_keeps_document_order() {
        let (tx, rx) = oneshot::channel();
        let completed = Arc::new(Mutex::new(Vec::new()));

        let mut registry = DirectiveRegistry::new();
        registry
            .register(
                "waiter",
                Directive::new(Restrict::Class).with_link(WaitFor {
                    rx: Mutex::new(Some(rx)),
                    completed: completed.clone(),
                }),
            )
            .unwrap();
        registry
            .register(
                "signaller",
                Directive::new(Restrict::Class).with_link(Signal {
                    tx: Mutex::new(Some(tx)),
                    completed: completed.clone(),
                }),
            )
            .unwrap();

        let out = render(
            &registry,
            r#"<div class="waiter"></div><div class="signaller"></div>"#,
            &Scope::new(),
        );

        assert_eq!(*completed.lock().unwrap(), ["signaller", "waiter"]);
        assert_eq!(
            out,
            r#"<div class="waiter" got="late"></div><div class="signaller" sent="yes"></div>"#
        );
    }

    #[test]
    fn test_links_on_one_element_do_not_block_each_other() {
        let (tx, rx) = oneshot::channel();
        let completed = Arc::new(Mutex::new(Vec::new()));

        let mut registry = DirectiveRegistry::new();
        registry
            .register(
                "waiter",
                Directive::new(Restrict::Class)
                    .with_priority(10)
                    .with_link(WaitFor {
                        rx: Mutex::new(Some(rx)),
                        completed: completed.clone(),
                    }),
            )
            .unwrap();
        registry
            .register(
                "signaller",
                Directive::new(Restrict::Class)
                    .with_priority(1)
                    .with_link(Signal {
                        tx: Mutex::new(Some(tx)),
                        completed: completed.clone(),
                    }),
            )
            .unwrap();

        let out = render(
            &registry,
            r#"<div class="waiter signaller">body</div>"#,
            &Scope::new(),
        );

        assert_eq!(*completed.lock().unwrap(), ["signaller", "waiter"]);
        assert_eq!(
            out,
            r#"<div class="waiter signaller" got="late" sent="yes">body</div>"#
        );
    }

    #[test]
    fn test_panicking_link_is_isolated() {
        let mut registry = registry_with(test_dir(Restrict::Class));
        registry
            .register(
                "explodes",
                Directive::new(Restrict::Class)
                    .with_priority(1)
                    .with_template("lost")
                    .with_link_fn(|_, _: &mut Element| -> Result<(), LinkError> {
                        panic!("link went down")
                    }),
            )
            .unwrap();

        let template = r#"<div class="explodes testDir">keep</div><p class="testDir"></p>"#;
        let (out, events) = capture(|| render(&registry, template, &Scope::new()));

        assert_eq!(
            out,
            r#"<div class="explodes testDir" test="test">keep</div><p class="testDir" test="test"></p>"#
        );
        let errors: Vec<_> = events
            .iter()
            .filter(|(level, _)| *level == Level::ERROR)
            .collect();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].1.contains("link went down"));
        assert!(errors[0].1.contains("explodes"));
    }

    #[test]
    fn test_self_including_template_stops_at_depth_limit() {
        let mut registry = DirectiveRegistry::new();
        registry
            .register(
                "loop",
                Directive::new(Restrict::Class).with_template(r#"<i class="loop">x</i>"#),
            )
            .unwrap();

        let (out, events) =
            capture(|| render(&registry, r#"<b class="loop"></b>"#, &Scope::new()));

        assert!(out.starts_with(r#"<b class="loop"><i class="loop"><i class="loop">"#));
        assert!(out.ends_with("x</i></i></b>"));
        assert_eq!(out.matches("<i ").count(), MAX_DIRECTIVE_DEPTH);
        assert_eq!(out.matches('x').count(), 1);
        let warnings: Vec<_> = events
            .iter()
            .filter(|(level, _)| *level == Level::WARN)
            .collect();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].1.contains("nesting limit"));
    }

    #[test]
    fn test_escaping_differs_between_interpolation_and_reserialization() {
        let scope = Scope::new().with("q", r#""a" & 'b' <c>"#);

        // Pure interpolation keeps the marker escaping as written.
        let empty = DirectiveRegistry::new();
        assert_eq!(
            render(&empty, "<p>{{{q}}}</p>", &scope),
            "<p>&quot;a&quot; &amp; &#39;b&#39; &lt;c&gt;</p>"
        );

        // With directives the markup is parsed and serialized again, so
        // quotes in text come back literal and `<>` in attributes do too.
        let registry = registry_with(test_dir(Restrict::Class));
        assert_eq!(
            render(&registry, r#"<p title="{{{q}}}">{{{q}}}</p>"#, &scope),
            r#"<p title="&quot;a&quot; &amp; 'b' <c>">"a" &amp; 'b' &lt;c&gt;</p>"#
        );
    }
}
