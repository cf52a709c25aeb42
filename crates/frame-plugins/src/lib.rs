// # Frame Plugins
//
// Local plugins for the Frame dashboard: everything that runs on the
// dashboard host itself, with no network access.
//
// | Registry | Types |
// |----------|-------|
// | value    | `shell`, `tail` |
// | action   | `shell`, `sequence`, `notification` |
// | parser   | `json`, `regex`, `detect`, `sequence` |
// | renderer | `json`, `status`, `pre` |
// | target   | `log` |
//
// ## Usage
//
// ```rust,ignore
// let plugins = Plugins::new();
// frame_plugins::register(&plugins);
// ```

pub mod actions;
pub mod command;
pub mod parsers;
pub mod renderers;
pub mod shell;
pub mod tail;
pub mod targets;

use frame_core::registry::VALUES;
use frame_core::{Action, NotificationTarget, Parser, Plugins, Renderer, ValueSource};

pub use actions::{Condition, NotificationAction, SequenceAction};
pub use command::CommandLine;
pub use shell::{ShellAction, ShellValue};
pub use tail::TailValue;

/// Register every local plugin
pub fn register(plugins: &Plugins) {
    plugins
        .values
        .register_contextual("shell", |settings, ctx| {
            Ok(Box::new(ShellValue::build(settings, ctx)?) as Box<dyn ValueSource>)
        });
    plugins.values.register("tail", |settings| {
        Ok(Box::new(TailValue::from_settings(settings)?) as Box<dyn ValueSource>)
    });
    plugins.set_default(VALUES, "tail", "renderer", "pre");

    plugins
        .actions
        .register_contextual("shell", |settings, ctx| {
            Ok(Box::new(ShellAction::build(settings, ctx)?) as Box<dyn Action>)
        });
    plugins.actions.register("sequence", |settings| {
        Ok(Box::new(SequenceAction::from_settings(settings)?) as Box<dyn Action>)
    });
    plugins
        .actions
        .register_contextual("notification", |settings, ctx| {
            Ok(Box::new(NotificationAction::build(settings, ctx)?) as Box<dyn Action>)
        });

    plugins.parsers.register("json", |_settings| {
        Ok(Box::new(parsers::JsonParser) as Box<dyn Parser>)
    });
    plugins.parsers.register("regex", |settings| {
        Ok(Box::new(parsers::RegexParser::from_settings(settings)?) as Box<dyn Parser>)
    });
    plugins.parsers.register("detect", |settings| {
        Ok(Box::new(parsers::DetectParser::from_settings(settings)?) as Box<dyn Parser>)
    });
    plugins
        .parsers
        .register_contextual("sequence", |settings, ctx| {
            Ok(Box::new(parsers::SequenceParser::build(settings, ctx)?) as Box<dyn Parser>)
        });

    plugins.renderers.register("json", |settings| {
        Ok(Box::new(renderers::JsonRenderer::from_settings(settings)?) as Box<dyn Renderer>)
    });
    plugins.renderers.register("status", |settings| {
        Ok(Box::new(renderers::StatusRenderer::from_settings(settings)?) as Box<dyn Renderer>)
    });
    plugins.renderers.register("pre", |settings| {
        Ok(Box::new(renderers::PreRenderer::from_settings(settings)?) as Box<dyn Renderer>)
    });

    plugins.targets.register("log", |settings| {
        Ok(Box::new(targets::LogTarget::from_settings(settings)?) as Box<dyn NotificationTarget>)
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use frame_core::Settings;

    #[test]
    fn test_register_all() {
        let plugins = Plugins::new();
        register(&plugins);

        for name in ["shell", "tail"] {
            assert!(plugins.values.has_type(name), "value {}", name);
        }
        for name in ["shell", "sequence", "notification"] {
            assert!(plugins.actions.has_type(name), "action {}", name);
        }
        for name in ["string", "json", "regex", "detect", "sequence"] {
            assert!(plugins.parsers.has_type(name), "parser {}", name);
        }
        for name in ["string", "json", "status", "pre"] {
            assert!(plugins.renderers.has_type(name), "renderer {}", name);
        }
        assert!(plugins.targets.has_type("log"));
    }

    #[test]
    fn test_tail_renders_preformatted_by_default() {
        let plugins = Plugins::new();
        register(&plugins);

        let settings = Settings::of_type("tail").with("path", "/var/log/syslog");
        let (_, resolved) = plugins.values.make(settings).unwrap();
        assert_eq!(resolved.get_str("renderer"), Some("pre"));
    }
}
