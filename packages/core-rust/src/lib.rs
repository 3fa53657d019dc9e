//! SOP Core: operation addresses, descriptors, results, and the bus wire format.

pub mod address;
pub mod clock;
pub mod context;
pub mod descriptor;
pub mod error;
pub mod filter;
pub mod messages;
pub mod operation;
pub mod result;
pub mod traits;
pub mod types;
pub mod version;

pub use address::{OperationAddress, DEFAULT_PROVIDER};
pub use clock::{ClockSource, ManualClock, SystemClock};
pub use context::TaskContext;
pub use descriptor::{OperationDescription, OperationDescriptor};
pub use error::{AddressError, FilterError, MessageError, VersionError};
pub use filter::OperationFilter;
pub use messages::{BusMessage, MessageKind};
pub use operation::{Operation, OperationFailure};
pub use result::{return_codes, ExecutionResult, FailureKind};
pub use traits::{AccessApi, BusHandler, MessageBus, SubscriptionId};
pub use types::{Account, Properties};
pub use version::{Version, VersionRange};
