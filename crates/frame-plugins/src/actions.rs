// # Actions
//
// - `sequence`: call the named `actions` in order with the caller's params;
//   a sequence that reaches itself again fails with the cycle
// - `notification`: watch the snapshot and notify `targets` when
//   `condition` becomes true

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use frame_core::registry::FactoryContext;
use frame_core::traits::render_plain;
use frame_core::{
    Action, ActionSet, Error, Notification, NotificationTarget, Result, Selector, Settings,
    SnapshotStore, Subscription,
};
use regex::{Captures, Regex};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

tokio::task_local! {
    /// Names of the sequences currently running on this task, outermost first
    static RUNNING: Vec<String>;
}

pub struct SequenceAction {
    name: Option<String>,
    actions: Vec<String>,
}

impl SequenceAction {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let actions = match settings.get("actions") {
            Some(Value::Array(names)) => names
                .iter()
                .map(|name| {
                    name.as_str().map(str::to_string).ok_or_else(|| {
                        Error::invalid_settings(format!("action names must be strings, got {}", name))
                    })
                })
                .collect::<Result<Vec<_>>>()?,
            _ => return Err(Error::invalid_settings("'actions' must be a list of action names")),
        };

        let name = settings.get_str("name").map(str::to_string);
        if let Some(name) = &name
            && actions.contains(name)
        {
            return Err(Error::invalid_settings(format!(
                "sequence '{}' cannot call itself",
                name
            )));
        }

        Ok(Self { name, actions })
    }
}

#[async_trait]
impl Action for SequenceAction {
    async fn call(&self, params: &Value, actions: &ActionSet) -> Result<Value> {
        let mut running = RUNNING.try_with(Clone::clone).unwrap_or_default();
        if let Some(name) = &self.name {
            if running.contains(name) {
                running.push(name.clone());
                return Err(Error::action(format!(
                    "sequence cycle: {}",
                    running.join(" -> ")
                )));
            }
            running.push(name.clone());
        }

        RUNNING
            .scope(running, async {
                let mut results = Vec::with_capacity(self.actions.len());
                for name in &self.actions {
                    results.push(actions.call(name, params).await?);
                }
                Ok::<_, Error>(Value::Array(results))
            })
            .await
    }
}

/// Comparison applied to one snapshot value
#[derive(Debug, Clone, PartialEq)]
pub enum Comparison {
    Equals(Value),
    NotEquals(Value),
    Above(f64),
    Below(f64),
}

/// `key` plus one comparison
///
/// `key` may use dots to reach into nested objects (`disk.used`).
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    key: String,
    comparison: Comparison,
}

impl Condition {
    pub fn from_settings(settings: &Value) -> Result<Self> {
        let key = settings
            .get("key")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::invalid_settings("condition needs a 'key'"))?
            .to_string();

        let number = |field: &str| -> Result<Option<f64>> {
            match settings.get(field) {
                None => Ok(None),
                Some(value) => as_number(value).map(Some).ok_or_else(|| {
                    Error::invalid_settings(format!("condition '{}' must be a number", field))
                }),
            }
        };

        let comparison = if let Some(value) = settings.get("equals") {
            Comparison::Equals(value.clone())
        } else if let Some(value) = settings.get("not_equals") {
            Comparison::NotEquals(value.clone())
        } else if let Some(limit) = number("above")? {
            Comparison::Above(limit)
        } else if let Some(limit) = number("below")? {
            Comparison::Below(limit)
        } else {
            return Err(Error::invalid_settings(
                "condition needs one of 'equals', 'not_equals', 'above', 'below'",
            ));
        };

        Ok(Self { key, comparison })
    }

    /// Evaluate against a whole snapshot (as a JSON object)
    pub fn holds(&self, snapshot: &Value) -> bool {
        let value = lookup(snapshot, &self.key).unwrap_or(&Value::Null);
        match &self.comparison {
            Comparison::Equals(expected) => loosely_equal(value, expected),
            Comparison::NotEquals(expected) => !loosely_equal(value, expected),
            Comparison::Above(limit) => as_number(value).is_some_and(|n| n > *limit),
            Comparison::Below(limit) => as_number(value).is_some_and(|n| n < *limit),
        }
    }
}

fn lookup<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(root, |value, segment| value.get(segment))
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Shell output is text, so `"1\n"` equals `1` and `"up"` equals `"up\n"`
fn loosely_equal(actual: &Value, expected: &Value) -> bool {
    actual == expected || render_plain(actual).trim() == render_plain(expected).trim()
}

const PLACEHOLDER: &str = r"\{\{\s*([\w.]+)\s*\}\}";

/// Message text with `{{key}}` placeholders filled from the snapshot
pub struct MessageTemplate {
    text: String,
    placeholder: Regex,
}

impl MessageTemplate {
    pub fn new(text: impl Into<String>) -> Result<Self> {
        Ok(Self {
            text: text.into(),
            placeholder: Regex::new(PLACEHOLDER).map_err(|e| Error::Other(e.to_string()))?,
        })
    }

    pub fn render(&self, snapshot: &Value) -> String {
        self.placeholder
            .replace_all(&self.text, |captures: &Captures<'_>| {
                lookup(snapshot, &captures[1]).map(render_plain).unwrap_or_default()
            })
            .into_owned()
    }
}

struct Notifier {
    subject: String,
    message: MessageTemplate,
    condition: Condition,
    targets: Vec<Arc<dyn NotificationTarget>>,
    last: Mutex<Option<bool>>,
}

impl Notifier {
    /// Called on every snapshot change; sends on a false → true edge
    ///
    /// The first observation only records the state.
    fn observe(&self, snapshot: &Value) {
        let now = self.condition.holds(snapshot);
        let previous = self
            .last
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(now);

        match previous {
            Some(false) if now => self.dispatch(snapshot),
            None => debug!("{}: condition starts as {}", self.subject, now),
            _ => {}
        }
    }

    fn notification(&self, snapshot: &Value) -> Notification {
        Notification::new(&self.subject, self.message.render(snapshot))
    }

    /// Hand the notification to every target without blocking the commit
    fn dispatch(&self, snapshot: &Value) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("{}: no runtime to deliver notification on", self.subject);
            return;
        };

        let notification = Arc::new(self.notification(snapshot));
        info!("{}: {}", notification.subject, notification.message);
        for target in &self.targets {
            let target = Arc::clone(target);
            let notification = Arc::clone(&notification);
            runtime.spawn(async move {
                if let Err(e) = target.notify(&notification).await {
                    warn!("Notification '{}' failed: {}", notification.subject, e);
                }
            });
        }
    }
}

/// Edge-triggered notification over the whole snapshot
///
/// Calling the action sends the message for the current snapshot right
/// away, regardless of the condition.
pub struct NotificationAction {
    notifier: Arc<Notifier>,
    store: Arc<SnapshotStore>,
    _subscription: Subscription,
}

impl NotificationAction {
    pub fn build(settings: &Settings, ctx: &FactoryContext<'_>) -> Result<Self> {
        let store = ctx
            .store()
            .ok_or_else(|| Error::MissingContext("notification".to_string()))?;

        let targets = match settings.get("targets") {
            None => Vec::new(),
            Some(Value::Array(targets)) => targets
                .iter()
                .map(|target| {
                    let target = Settings::from_value(target.clone())?;
                    let (target, _) = ctx.plugins().targets.make_with(target, ctx)?;
                    Ok(Arc::from(target))
                })
                .collect::<Result<Vec<Arc<dyn NotificationTarget>>>>()?,
            Some(other) => {
                return Err(Error::invalid_settings(format!("'targets' must be a list, got {}", other)));
            }
        };

        let condition = settings
            .get("condition")
            .ok_or_else(|| Error::invalid_settings("missing 'condition'"))
            .and_then(Condition::from_settings)?;

        let subject = settings
            .get_str("subject")
            .or_else(|| settings.get_str("name"))
            .unwrap_or("notification")
            .to_string();

        let notifier = Arc::new(Notifier {
            subject,
            message: MessageTemplate::new(settings.get_str("message").unwrap_or_default())?,
            condition,
            targets,
            last: Mutex::new(None),
        });

        let watcher = Arc::clone(&notifier);
        let subscription = store.subscribe(Selector::all(), move |snapshot| watcher.observe(snapshot));

        // Prime the edge detector with the state at construction time
        notifier.observe(&store.current().to_value());

        Ok(Self {
            notifier,
            store: Arc::clone(store),
            _subscription: subscription,
        })
    }
}

#[async_trait]
impl Action for NotificationAction {
    async fn call(&self, _params: &Value, _actions: &ActionSet) -> Result<Value> {
        let notification = self.notifier.notification(&self.store.current().to_value());

        let mut delivered = 0;
        for target in &self.notifier.targets {
            match target.notify(&notification).await {
                Ok(()) => delivered += 1,
                Err(e) => warn!("Notification '{}' failed: {}", notification.subject, e),
            }
        }

        Ok(json!({ "message": notification.message, "delivered": delivered }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use frame_core::Plugins;
    use std::time::Duration;
    use tokio::sync::mpsc;

    struct ChannelTarget(mpsc::UnboundedSender<Notification>);

    #[async_trait]
    impl NotificationTarget for ChannelTarget {
        async fn notify(&self, notification: &Notification) -> Result<()> {
            let _ = self.0.send(notification.clone());
            Ok(())
        }
    }

    fn plugins() -> (Plugins, mpsc::UnboundedReceiver<Notification>) {
        let plugins = Plugins::new();
        crate::register(&plugins);

        let (tx, rx) = mpsc::unbounded_channel();
        plugins.targets.register("channel", move |_settings| {
            Ok(Box::new(ChannelTarget(tx.clone())) as Box<dyn NotificationTarget>)
        });
        (plugins, rx)
    }

    fn set(store: &SnapshotStore, key: &str, value: Value) {
        store
            .transition(|snapshot| {
                snapshot.set(key, value)?;
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_condition_comparisons() {
        let snapshot = json!({"cpu": "87.5\n", "disk": {"used": 40}, "state": "up"});

        let above = Condition::from_settings(&json!({"key": "cpu", "above": 80})).unwrap();
        assert!(above.holds(&snapshot));

        let below = Condition::from_settings(&json!({"key": "disk.used", "below": 50})).unwrap();
        assert!(below.holds(&snapshot));

        let equals = Condition::from_settings(&json!({"key": "state", "equals": "up"})).unwrap();
        assert!(equals.holds(&snapshot));

        let missing = Condition::from_settings(&json!({"key": "nope", "not_equals": "up"})).unwrap();
        assert!(missing.holds(&snapshot));

        assert!(Condition::from_settings(&json!({"key": "cpu"})).is_err());
    }

    #[test]
    fn test_message_placeholders() {
        let snapshot = json!({"cpu": "91", "host": {"name": "studio"}});
        let template = MessageTemplate::new("{{ host.name }} at {{cpu}}%{{missing}}").unwrap();
        assert_eq!(template.render(&snapshot), "studio at 91%");
    }

    #[tokio::test]
    async fn test_notifies_on_rising_edge_only() {
        let (plugins, mut rx) = plugins();
        let store = Arc::new(SnapshotStore::new(["cpu"]));
        let ctx = FactoryContext::with_store(&plugins, &store);

        let settings = Settings::of_type("notification")
            .with("name", "cpu-alert")
            .with("message", "CPU at {{cpu}}")
            .with("condition", json!({"key": "cpu", "above": 80}))
            .with("targets", json!(["channel"]));
        let (_action, _) = plugins.actions.make_with(settings, &ctx).unwrap();

        set(&store, "cpu", json!(95));
        set(&store, "cpu", json!(50));
        set(&store, "cpu", json!(90));
        set(&store, "cpu", json!(99));

        let first = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
        assert_eq!(first, Notification::new("cpu-alert", "CPU at 95"));
        let second = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
        assert_eq!(second.message, "CPU at 90");

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_call_sends_immediately() {
        let (plugins, mut rx) = plugins();
        let store = Arc::new(SnapshotStore::new(["cpu"]));
        set(&store, "cpu", json!(12));
        let ctx = FactoryContext::with_store(&plugins, &store);

        let settings = Settings::of_type("notification")
            .with("name", "report")
            .with("message", "CPU at {{cpu}}")
            .with("condition", json!({"key": "cpu", "above": 80}))
            .with("targets", json!(["channel"]));
        let (action, _) = plugins.actions.make_with(settings, &ctx).unwrap();

        let result = action.call(&json!({}), &ActionSet::new()).await.unwrap();
        assert_eq!(result["delivered"], json!(1));
        assert_eq!(rx.recv().await.unwrap().message, "CPU at 12");
    }

    #[test]
    fn test_notification_requires_store() {
        let (plugins, _rx) = plugins();
        let settings = Settings::of_type("notification")
            .with("condition", json!({"key": "cpu", "equals": 1}));

        assert!(matches!(
            plugins.actions.make_with(settings, &plugins.context()),
            Err(Error::MissingContext(_))
        ));
    }

    #[tokio::test]
    async fn test_sequence_calls_in_order() {
        let (plugins, _rx) = plugins();
        let ctx = plugins.context();

        let mut actions = ActionSet::new();
        for (name, cmd) in [("first", "echo 1"), ("second", "echo 2")] {
            let settings = Settings::of_type("shell").with("cmd", cmd).with("parser", "json");
            actions.insert(name, plugins.actions.make_with(settings, &ctx).unwrap().0);
        }
        let settings = Settings::of_type("sequence").with("actions", json!(["first", "second"]));
        actions.insert("both", plugins.actions.make_with(settings, &ctx).unwrap().0);

        assert_eq!(actions.call("both", &json!({})).await.unwrap(), json!([1, 2]));

        let settings = Settings::of_type("sequence").with("actions", json!(["first", "missing"]));
        actions.insert("broken", plugins.actions.make_with(settings, &ctx).unwrap().0);
        assert!(matches!(
            actions.call("broken", &json!({})).await,
            Err(Error::UnknownAction(_))
        ));
    }

    #[test]
    fn test_sequence_naming_itself_is_rejected() {
        let settings = Settings::of_type("sequence")
            .with("name", "again")
            .with("actions", json!(["again"]));
        assert!(matches!(
            SequenceAction::from_settings(&settings),
            Err(Error::InvalidSettings(_))
        ));
    }

    #[tokio::test]
    async fn test_sequence_cycle_fails_instead_of_recursing() {
        let mut actions = ActionSet::new();
        for (name, next) in [("ping", "pong"), ("pong", "ping")] {
            let settings = Settings::of_type("sequence")
                .with("name", name)
                .with("actions", json!([next]));
            actions.insert(name, Box::new(SequenceAction::from_settings(&settings).unwrap()));
        }

        let err = actions.call("ping", &json!({})).await.unwrap_err();
        assert!(matches!(err, Error::Action(_)));
        assert!(err.to_string().contains("ping -> pong -> ping"));
    }
}
