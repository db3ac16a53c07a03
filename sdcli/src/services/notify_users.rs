//! Bulk user notifications

use serde_json::Value;

use sdcli_common::batches;

use super::platform_client::{PlatformBackend, QUERY_PAGE_SIZE};
use crate::error::{CliError, CliResult};
use crate::models::{NotificationCreateRequest, NotificationType, PlatformQuery, UserPublic};

/// Receivers per notification request
pub const NOTIFICATION_BATCH_SIZE: usize = 75;

/// Organization membership filter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OrganizationFilter {
    #[default]
    NoFilter,
    InOrganization,
    NotInOrganization,
}

/// Which users to notify
#[derive(Debug, Clone, Default)]
pub struct NotifyUsersOptions {
    /// Partial subscribed plan name
    pub plan_name: Option<String>,
    /// Exact subscribed plan name, takes precedence over `plan_name`
    pub plan_name_exact: Option<String>,
    pub features_true: Vec<String>,
    pub features_false: Vec<String>,
    pub organization_filter: OrganizationFilter,
    pub organization_roles: Vec<String>,
    /// Only list the matching users
    pub dry_run: bool,
    /// Offset to resume paging from
    pub offset: Option<String>,
}

/// What to send
#[derive(Debug, Clone)]
pub struct NotificationOptions {
    pub notification_type: String,
    pub description: String,
    pub href: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Build the user query filters
pub fn build_user_filters(options: &NotifyUsersOptions) -> Vec<(String, Value)> {
    let mut filters: Vec<(String, Value)> = vec![("deleted_at[?]".to_string(), Value::Null)];

    if let Some(exact) = non_empty(&options.plan_name_exact) {
        filters.push(("chargebee_user.type".to_string(), Value::from("plan")));
        filters.push(("chargebee_user.data->name[=]".to_string(), Value::from(exact)));
    } else if let Some(partial) = non_empty(&options.plan_name) {
        filters.push(("chargebee_user.type".to_string(), Value::from("plan")));
        filters.push(("chargebee_user.data->name[%]".to_string(), Value::from(partial)));
    }

    let features = options
        .features_true
        .iter()
        .map(|f| (f, true))
        .chain(options.features_false.iter().map(|f| (f, false)));
    for (feature, enabled) in features {
        let feature = feature.trim();
        if !feature.is_empty() {
            filters.push((format!("user_features->feature->{}", feature), Value::Bool(enabled)));
        }
    }

    match options.organization_filter {
        OrganizationFilter::NoFilter => {}
        OrganizationFilter::InOrganization => {
            filters.push(("organization_id[!?]".to_string(), Value::Null));
        }
        OrganizationFilter::NotInOrganization => {
            filters.push(("organization_id[?]".to_string(), Value::Null));
        }
    }

    let roles: Vec<&str> = options
        .organization_roles
        .iter()
        .map(|r| r.trim())
        .filter(|r| !r.is_empty())
        .collect();
    match roles.as_slice() {
        [] => {}
        [role] => filters.push(("organization_role".to_string(), Value::from(*role))),
        _ => filters.push(("organization_role[,]".to_string(), Value::from(roles))),
    }

    filters
}

/// Page through matching users and notify them in batches
///
/// Returns every matched user, also in dry-run mode.
pub async fn notify_users<P: PlatformBackend + ?Sized>(
    platform: &P,
    options: &NotifyUsersOptions,
    notification: &NotificationOptions,
) -> CliResult<Vec<UserPublic>> {
    let notification_type: NotificationType = notification
        .notification_type
        .parse()
        .map_err(CliError::InvalidParameter)?;

    let filters = build_user_filters(options);
    let mut offset = options.offset.clone();
    let mut notified = Vec::new();

    loop {
        let query = PlatformQuery {
            filters: filters.clone(),
            limit: Some(QUERY_PAGE_SIZE),
            offset: offset.take(),
            strict_limit: Some(true),
            ..Default::default()
        };
        let page = platform.query_users(&query).await?;
        let users = page.result;
        offset = page.pagination.next_offset;

        match &offset {
            Some(next) => tracing::info!(count = users.len(), offset = %next, "Fetched users"),
            None => tracing::info!(count = users.len(), "Fetched users, done"),
        }

        if options.dry_run {
            tracing::info!("Dry run mode, not creating notifications");
        } else {
            for batch in batches(&users, NOTIFICATION_BATCH_SIZE)? {
                for user in &batch {
                    tracing::info!(
                        user_id = %user.id,
                        username = user.username.as_deref().unwrap_or(""),
                        email = user.email.as_deref().unwrap_or(""),
                        "Creating notification"
                    );
                }

                let request = NotificationCreateRequest {
                    creator: "platform",
                    level: "info",
                    class: "account",
                    notification_type,
                    description: notification.description.clone(),
                    receiver_ids: batch.iter().map(|u| u.id.clone()).collect(),
                    href: notification.href.clone(),
                };
                platform.create_notifications(&request).await?;
            }
        }

        notified.extend(users);
        if offset.is_none() {
            break;
        }
    }

    Ok(notified)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn has(filters: &[(String, Value)], key: &str, value: Value) -> bool {
        filters.iter().any(|(k, v)| k == key && *v == value)
    }

    #[test]
    fn test_deleted_users_always_excluded() {
        let filters = build_user_filters(&NotifyUsersOptions::default());
        assert_eq!(filters, vec![("deleted_at[?]".to_string(), Value::Null)]);
    }

    #[test]
    fn test_exact_plan_name_wins() {
        let options = NotifyUsersOptions {
            plan_name: Some("Pro".to_string()),
            plan_name_exact: Some("Pro Yearly".to_string()),
            ..Default::default()
        };
        let filters = build_user_filters(&options);

        assert!(has(&filters, "chargebee_user.data->name[=]", Value::from("Pro Yearly")));
        assert!(!filters.iter().any(|(k, _)| k == "chargebee_user.data->name[%]"));
        assert!(has(&filters, "chargebee_user.type", Value::from("plan")));
    }

    #[test]
    fn test_partial_plan_name() {
        let options = NotifyUsersOptions {
            plan_name: Some("Pro".to_string()),
            plan_name_exact: Some("  ".to_string()),
            ..Default::default()
        };
        let filters = build_user_filters(&options);
        assert!(has(&filters, "chargebee_user.data->name[%]", Value::from("Pro")));
    }

    #[test]
    fn test_feature_and_organization_filters() {
        let options = NotifyUsersOptions {
            features_true: vec![" beta ".to_string(), "".to_string()],
            features_false: vec!["legacy".to_string()],
            organization_filter: OrganizationFilter::InOrganization,
            organization_roles: vec!["admin".to_string(), " member".to_string()],
            ..Default::default()
        };
        let filters = build_user_filters(&options);

        assert!(has(&filters, "user_features->feature->beta", Value::Bool(true)));
        assert!(has(&filters, "user_features->feature->legacy", Value::Bool(false)));
        assert!(has(&filters, "organization_id[!?]", Value::Null));
        assert!(has(
            &filters,
            "organization_role[,]",
            serde_json::json!(["admin", "member"])
        ));
        assert_eq!(filters.len(), 5);
    }

    #[test]
    fn test_single_role_uses_plain_filter() {
        let options = NotifyUsersOptions {
            organization_filter: OrganizationFilter::NotInOrganization,
            organization_roles: vec!["owner".to_string()],
            ..Default::default()
        };
        let filters = build_user_filters(&options);
        assert!(has(&filters, "organization_role", Value::from("owner")));
        assert!(has(&filters, "organization_id[?]", Value::Null));
    }
}
