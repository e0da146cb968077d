/// This module classifies store failures into conflicts and other failures.
pub mod detection;
/// This module contains the conflict hook over pending replace results.
pub mod continuation;
/// This module contains the re-read-and-retry policy built on the hook.
pub mod resolution;
