// # Value Source Trait
//
// Defines the interface for fetching the current value of one dashboard
// property.
//
// ## Implementations
//
// - Shell command output: `frame-plugins` (`shell`)
// - File tail: `frame-plugins` (`tail`)
//
// ## Usage
//
// ```rust,ignore
// use frame_core::ValueSource;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let source = /* ValueSource implementation */;
//     let value = source.fetch().await?;
//     println!("current value: {}", value);
//     Ok(())
// }
// ```

use async_trait::async_trait;
use serde_json::Value;

/// Trait for value source implementations
///
/// A value source is the fetch half of a property delegate. The engine owns
/// scheduling: it decides when to call [`ValueSource::fetch`], runs fetches of
/// different keys concurrently, and commits the results into the snapshot.
///
/// ## Allowed Capabilities
/// - ✅ Perform I/O (spawn processes, read files, call network services)
/// - ✅ Cache whatever is needed to answer cheaply (e.g. file mtime)
///
/// ## Forbidden Capabilities
/// - ❌ Write into the snapshot store (the engine commits results)
/// - ❌ Spawn polling loops (use the engine's `auto_update`)
/// - ❌ Retry internally; return an error and let the next poll try again
#[async_trait]
pub trait ValueSource: Send + Sync {
    /// Fetch the current value
    ///
    /// # Returns
    ///
    /// - `Ok(Value)`: The freshly fetched value
    /// - `Err(Error)`: If the underlying command, file or service failed
    async fn fetch(&self) -> Result<Value, crate::Error>;
}
