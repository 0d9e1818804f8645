pub mod account;
pub mod policy;
pub mod recommendation;

pub use account::{Account, AccountId, AccountProjection, AccountRef};
pub use policy::{ExternalEngine, InstancePolicy, Strategy};
pub use recommendation::{
    CandidateDescriptor, RecommendationParams, RecommendationRequest, RecommendedAccount,
    ScoredCandidate, DEFAULT_LIMIT, MAX_LIMIT,
};
