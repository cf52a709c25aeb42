// # Log Target
//
// Writes notifications to the tracing log at the configured `level`
// (`info` by default).

use async_trait::async_trait;
use frame_core::{Error, Notification, NotificationTarget, Result, Settings};
use tracing::{Level, event};

pub struct LogTarget {
    level: Level,
}

impl LogTarget {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let level = match settings.get_str("level") {
            None => Level::INFO,
            Some(level) => level
                .parse()
                .map_err(|_| Error::invalid_settings(format!("unknown log level '{}'", level)))?,
        };
        Ok(Self { level })
    }
}

#[async_trait]
impl NotificationTarget for LogTarget {
    async fn notify(&self, notification: &Notification) -> Result<()> {
        let Notification { subject, message } = notification;
        match self.level {
            Level::ERROR => event!(Level::ERROR, %subject, "{}", message),
            Level::WARN => event!(Level::WARN, %subject, "{}", message),
            Level::INFO => event!(Level::INFO, %subject, "{}", message),
            Level::DEBUG => event!(Level::DEBUG, %subject, "{}", message),
            _ => event!(Level::TRACE, %subject, "{}", message),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_target() {
        let target = LogTarget::from_settings(&Settings::of_type("log").with("level", "warn")).unwrap();
        assert_eq!(target.level, Level::WARN);
        target.notify(&Notification::new("disk", "93% used")).await.unwrap();

        assert!(LogTarget::from_settings(&Settings::of_type("log").with("level", "loud")).is_err());
    }
}
