use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

use crate::{
    error::{AppError, AppResult},
    models::{AccountRef, ExternalEngine, RecommendationRequest, RecommendedAccount, Strategy},
    services::{
        delegate::DelegateClient,
        exclusions::resolve_exclusions,
        packer::AccountPacker,
        ranking::{rank_candidates, ActivityCriteria},
        reconcile::Reconciler,
        resolver::IdentityResolver,
        store::{AccountDirectory, FollowGraph, HiddenAccounts, PolicySource},
    },
};

/// External services the recommender reads from
#[derive(Clone)]
pub struct Collaborators {
    pub policy: Arc<dyn PolicySource>,
    pub directory: Arc<dyn AccountDirectory>,
    pub graph: Arc<dyn FollowGraph>,
    pub hidden: Arc<dyn HiddenAccounts>,
    pub resolver: Arc<dyn IdentityResolver>,
}

/// Produces follow suggestions for a requester
///
/// The policy is read once per call and decides between ranking the local
/// population and asking the external engine.
#[derive(Clone)]
pub struct Recommender {
    policy: Arc<dyn PolicySource>,
    directory: Arc<dyn AccountDirectory>,
    graph: Arc<dyn FollowGraph>,
    hidden: Arc<dyn HiddenAccounts>,
    delegate: DelegateClient,
    packer: AccountPacker,
    reconciler: Reconciler,
}

impl Recommender {
    pub fn new(
        collaborators: Collaborators,
        delegate: DelegateClient,
        resolution_timeout: Duration,
    ) -> Self {
        let packer = AccountPacker::new(collaborators.graph.clone());
        let reconciler = Reconciler::new(
            collaborators.resolver.clone(),
            packer.clone(),
            resolution_timeout,
        );

        Self {
            policy: collaborators.policy,
            directory: collaborators.directory,
            graph: collaborators.graph,
            hidden: collaborators.hidden,
            delegate,
            packer,
            reconciler,
        }
    }

    pub async fn recommend(
        &self,
        request: &RecommendationRequest,
    ) -> AppResult<Vec<RecommendedAccount>> {
        let policy = self.policy.load().await.map_err(|e| match e {
            AppError::PolicyUnavailable(_) => e,
            other => AppError::PolicyUnavailable(other.to_string()),
        })?;

        let strategy = Strategy::select(&policy, request.requester.as_ref());
        let strategy_name = strategy.name();
        tracing::debug!(strategy = strategy_name, "Selected recommendation strategy");

        let recommendations = match strategy {
            Strategy::Internal => self.recommend_internal(request).await?,
            Strategy::External { engine, requester } => {
                self.recommend_external(&engine, requester, request).await?
            }
        };

        tracing::info!(
            strategy = strategy_name,
            returned = recommendations.len(),
            limit = request.limit,
            offset = request.offset,
            "Recommendations produced"
        );

        Ok(recommendations)
    }

    async fn recommend_internal(
        &self,
        request: &RecommendationRequest,
    ) -> AppResult<Vec<RecommendedAccount>> {
        let viewer = request.requester.as_ref();

        let exclusions =
            resolve_exclusions(self.graph.as_ref(), self.hidden.as_ref(), viewer).await?;
        let criteria = ActivityCriteria::at(Utc::now());

        let population = self
            .directory
            .active_accounts(&criteria, &exclusions)
            .await?;

        let ranked = rank_candidates(
            population,
            &exclusions,
            &criteria,
            request.limit as usize,
            request.offset as usize,
        );

        let packed = self
            .packer
            .pack_many(ranked.iter().map(|candidate| &candidate.account), viewer)
            .await?;

        Ok(packed.into_iter().map(RecommendedAccount::Packed).collect())
    }

    async fn recommend_external(
        &self,
        engine: &ExternalEngine,
        requester: &AccountRef,
        request: &RecommendationRequest,
    ) -> AppResult<Vec<RecommendedAccount>> {
        let mut descriptors = self
            .delegate
            .fetch(engine, requester, request.limit, request.offset)
            .await?;

        let limit = request.limit as usize;
        if descriptors.len() > limit {
            tracing::debug!(
                received = descriptors.len(),
                limit,
                "Engine returned more candidates than requested, truncating"
            );
            descriptors.truncate(limit);
        }

        self.reconciler.reconcile(descriptors, requester).await
    }
}
