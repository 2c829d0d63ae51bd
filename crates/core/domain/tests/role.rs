use domain::Role;

#[test]
fn unknown_roles_parse_as_none() {
    assert_eq!(Role::parse("viewer"), Role::Viewer);
    assert_eq!(Role::parse(" Manager "), Role::Manager);
    assert_eq!(Role::parse("superuser"), Role::None);
    assert_eq!(Role::parse(""), Role::None);
}

#[test]
fn role_comparison_follows_ladder() {
    assert!(Role::Manager.is_at_least(Role::Editor));
    assert!(Role::Editor.is_at_least(Role::Viewer));
    assert!(Role::Viewer.is_at_least(Role::None));
    assert!(Role::None.is_at_least(Role::None));
    assert!(!Role::Viewer.is_at_least(Role::Editor));
    assert!(!Role::None.is_at_least(Role::Viewer));
    assert!(!Role::Editor.is_at_least(Role::Manager));
    assert!(!Role::Thing.is_at_least(Role::Editor));
}

#[test]
fn supremum_is_monotonic() {
    let base = [Role::Viewer, Role::None];
    let lower = Role::supremum(base);
    assert_eq!(lower, Role::Viewer);

    let higher = Role::supremum(base.into_iter().chain([Role::Manager]));
    assert_eq!(higher, Role::Manager);
    assert!(higher.is_at_least(lower));

    assert_eq!(Role::supremum([]), Role::None);
    assert_eq!(Role::supremum([Role::Manager, Role::Thing]), Role::Thing);
}
