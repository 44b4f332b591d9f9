//! User based metrics

use entitle_common::{ComputedLicenses, Result, UserRecord};
use std::collections::BTreeSet;
use tracing::instrument;

use crate::context::ComputationContext;

/// Sum of user counts
#[instrument(skip(ctx))]
pub async fn user_sum(ctx: &ComputationContext) -> Result<ComputedLicenses> {
    let users = ctx.users().await?;
    Ok(ComputedLicenses::new(total_count(&users)))
}

/// Distinct nominative users, optionally of one profile
#[instrument(skip(ctx))]
pub async fn user_nominative(
    ctx: &ComputationContext,
    profile: Option<&str>,
) -> Result<ComputedLicenses> {
    let users = ctx.users().await?;
    let distinct: BTreeSet<&str> = users
        .iter()
        .filter(|u| !u.concurrent && matches_profile(u, profile))
        .map(|u| u.id.as_str())
        .collect();
    Ok(ComputedLicenses::new(distinct.len() as u64))
}

/// Sum of concurrent user counts
#[instrument(skip(ctx))]
pub async fn user_concurrent(ctx: &ComputationContext) -> Result<ComputedLicenses> {
    let users = ctx.users().await?;
    Ok(ComputedLicenses::new(total_count(
        users.iter().filter(|u| u.concurrent),
    )))
}

/// Sum of user counts, saturating at `u64::MAX`
pub fn total_count<'a>(users: impl IntoIterator<Item = &'a UserRecord>) -> u64 {
    users
        .into_iter()
        .fold(0u64, |total, user| total.saturating_add(user.count))
}

fn matches_profile(user: &UserRecord, profile: Option<&str>) -> bool {
    match profile.map(str::trim) {
        None | Some("") => true,
        Some(p) if p.eq_ignore_ascii_case("all") => true,
        Some(p) => user
            .profile
            .as_deref()
            .map(|actual| actual.trim().eq_ignore_ascii_case(p))
            .unwrap_or(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::InMemoryEquipmentGraph;
    use std::sync::Arc;

    fn ctx() -> ComputationContext {
        let graph = InMemoryEquipmentGraph::new();
        graph.insert_user("sc", UserRecord::new("u1", "crm", 4).with_profile("Admin"));
        graph.insert_user("sc", UserRecord::new("u2", "crm", 2).with_profile("viewer"));
        graph.insert_user("sc", UserRecord::new("u3", "crm", 1));
        graph.insert_user("sc", UserRecord::new("u4", "crm", 10).concurrent());
        graph.insert_user("sc", UserRecord::new("u5", "erp", 8));
        ComputationContext::new(Arc::new(graph), "sc", vec!["crm".into()])
    }

    #[tokio::test]
    async fn test_user_sum() {
        assert_eq!(user_sum(&ctx()).await.unwrap().licenses, 17);
    }

    #[tokio::test]
    async fn test_user_nominative_profiles() {
        assert_eq!(user_nominative(&ctx(), None).await.unwrap().licenses, 3);
        assert_eq!(user_nominative(&ctx(), Some("All")).await.unwrap().licenses, 3);
        assert_eq!(user_nominative(&ctx(), Some("admin")).await.unwrap().licenses, 1);
    }

    #[tokio::test]
    async fn test_user_concurrent() {
        assert_eq!(user_concurrent(&ctx()).await.unwrap().licenses, 10);
    }

    #[test]
    fn test_total_count_saturates() {
        let users = vec![
            UserRecord::new("u1", "crm", u64::MAX - 1),
            UserRecord::new("u2", "crm", 5),
        ];
        assert_eq!(total_count(&users), u64::MAX);
        assert_eq!(total_count(&users[1..]), 5);
    }
}
