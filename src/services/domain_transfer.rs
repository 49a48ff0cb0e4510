//! Cross-domain transfer policy.

use crate::models::DomainContext;

/// Decides whether knowledge from `source` may flow into `target`.
///
/// A transfer is allowed when any of these holds:
///
/// 1. both contexts share the primary domain;
/// 2. `source` carries an approved grant whose target is `target`'s domain;
/// 3. both contexts name the same knowledge vertical.
///
/// # Example
///
/// ```rust
/// use mnemo::models::{DomainContext, PrimaryDomain};
/// use mnemo::services::validate_transfer;
///
/// let personal = DomainContext::new(PrimaryDomain::Personal);
/// let work = DomainContext::new(PrimaryDomain::Professional);
/// assert!(!validate_transfer(&personal, &work));
/// assert!(validate_transfer(&personal.clone().with_vertical("cooking"),
///                           &work.with_vertical("cooking")));
/// ```
#[must_use]
pub fn validate_transfer(source: &DomainContext, target: &DomainContext) -> bool {
    if source.primary_domain == target.primary_domain {
        return true;
    }

    if source
        .cross_domain
        .as_ref()
        .is_some_and(|grant| grant.permits(target.primary_domain))
    {
        return true;
    }

    matches!(
        (&source.knowledge_vertical, &target.knowledge_vertical),
        (Some(a), Some(b)) if a == b
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CrossDomainGrant, PrimaryDomain};
    use test_case::test_case;

    fn ctx(domain: PrimaryDomain) -> DomainContext {
        DomainContext::new(domain)
    }

    #[test_case(PrimaryDomain::Personal, PrimaryDomain::Personal, true ; "same domain")]
    #[test_case(PrimaryDomain::General, PrimaryDomain::General, true ; "both general")]
    #[test_case(PrimaryDomain::Personal, PrimaryDomain::Professional, false ; "different domains")]
    #[test_case(PrimaryDomain::General, PrimaryDomain::System, false ; "general is not a wildcard")]
    fn test_domain_equality(source: PrimaryDomain, target: PrimaryDomain, expected: bool) {
        assert_eq!(validate_transfer(&ctx(source), &ctx(target)), expected);
    }

    #[test]
    fn test_approved_grant_for_target_allows() {
        let source = ctx(PrimaryDomain::Personal).with_cross_domain(CrossDomainGrant::approved(
            PrimaryDomain::Personal,
            PrimaryDomain::Professional,
            "user approved",
        ));
        assert!(validate_transfer(&source, &ctx(PrimaryDomain::Professional)));
        assert!(!validate_transfer(&source, &ctx(PrimaryDomain::System)));
    }

    #[test]
    fn test_requested_grant_does_not_allow() {
        let source = ctx(PrimaryDomain::Personal).with_cross_domain(CrossDomainGrant::requested(
            PrimaryDomain::Personal,
            PrimaryDomain::Professional,
        ));
        assert!(!validate_transfer(&source, &ctx(PrimaryDomain::Professional)));
    }

    #[test]
    fn test_shared_vertical_allows() {
        let source = ctx(PrimaryDomain::Personal).with_vertical("finance");
        let target = ctx(PrimaryDomain::Professional).with_vertical("finance");
        assert!(validate_transfer(&source, &target));

        let other = ctx(PrimaryDomain::Professional).with_vertical("devops");
        assert!(!validate_transfer(&source, &other));
    }

    #[test]
    fn test_missing_vertical_never_matches() {
        let source = ctx(PrimaryDomain::Personal);
        let target = ctx(PrimaryDomain::Professional).with_vertical("finance");
        assert!(!validate_transfer(&source, &target));
    }
}
