pub mod dom;
pub mod error;
pub mod outcome;
pub mod remote;
pub mod rule;

pub use dom::{ControlKind, Document, Element, Markup, NodeId};
pub use error::{FormError, Result};
pub use outcome::{OutcomeStatus, Severity, Verdict};
pub use remote::{DependentValue, RemoteCompletion, RemoteResponse, RequestParameters};
pub use rule::{MessageMap, MessageSpec, RuleArgument, RuleDescriptor, RuleNode, is_truthy};
