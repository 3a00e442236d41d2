//! Registry-clearing lives in its own test binary so it cannot race the
//! descriptor counts asserted elsewhere.

mod support;

use matcall_core::class_proxy::registered_classes;
use matcall_core::{clear_class_registry, EngineValue, HostValue};

#[test]
fn test_clearing_the_registry_forces_introspection() {
    let (session, state) = support::FakeEngine::new()
        .with_class("pkg.Valve", &[("open", EngineValue::Bool(false))], &["toggle"])
        .into_session();

    let first = session.eval("pkg.Valve(true)", -1).unwrap();
    assert!(matches!(first, HostValue::Object(_)));
    assert!(registered_classes().contains(&"pkg_Valve".to_string()));

    session.eval("pkg.Valve(false)", -1).unwrap();
    assert_eq!(state.lock().introspections, 1);

    clear_class_registry();
    assert!(registered_classes().is_empty());

    let again = session.eval("pkg.Valve(true)", -1).unwrap();
    assert_eq!(state.lock().introspections, 2);
    let valve = again.as_object().unwrap();
    assert_eq!(valve.get("open").unwrap(), HostValue::Bool(true));
    assert_eq!(valve.call("toggle", &[]).unwrap(), HostValue::from("pkg.Valve.toggle"));
}
