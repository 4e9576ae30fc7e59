pub mod job;
pub mod loaders;
pub mod payload;
pub mod profile;
pub mod proxy;
pub mod result;

pub use job::{AtsKind, JobData, JobDescriptor};
pub use loaders::{load_payload_file, load_proxy_pool};
pub use payload::{AutomationPayload, BridgeOutput, ValidatedPayload};
pub use profile::{UserProfile, UserProfileData};
pub use proxy::{ProxyConfig, ProxyScheme};
pub use result::{
    ApplicationResult, ApplicationStatus, AutomationStep, CaptchaEvent, CaptchaKind,
    ResolutionMethod,
};
