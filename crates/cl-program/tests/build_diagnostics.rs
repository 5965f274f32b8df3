//! Build failure diagnostics against the fake native layer.

use std::sync::Arc;

use cl_program::fake::FakeApi;
use cl_program::{BuildStatus, Device, Error, Program, ProgramHandle, StatusError};

fn failing_program() -> (Arc<FakeApi>, Program, ProgramHandle) {
    let api = Arc::new(FakeApi::new());
    let handle = api.add_program(&["main"]);
    api.fail_build(handle, StatusError::from_code(-11));
    let program = Program::from_raw(api.clone(), handle).unwrap();
    (api, program, handle)
}

#[test]
fn end_to_end_composite_error() {
    let (api, mut program, handle) = failing_program();
    let d1 = api.add_device("GPU0");
    let d2 = api.add_device("GPU1");
    api.set_associated_devices(handle, &[d1, d2]);
    api.set_build_log(handle, d1, "error: syntax\n");
    api.set_build_log(handle, d2, "");

    let err = program.build(&[], "-O2").unwrap_err();
    let Error::Build(build) = &err else {
        panic!("expected composite build error, got {err:?}");
    };
    assert_eq!(build.status(), StatusError::BuildProgramFailure);
    assert_eq!(build.sections(), ["GPU0:\nerror: syntax".to_owned()]);
    assert_eq!(err.to_string(), "status=CL_BUILD_PROGRAM_FAILURE\nGPU0:\nerror: syntax");
    assert_eq!(api.build_calls(handle)[0].options.as_deref(), Some("-O2"));
}

#[test]
fn failed_build_does_not_touch_device_cache() {
    let (api, mut program, handle) = failing_program();
    let d1 = api.device("GPU0");
    api.set_build_log(handle, d1.id(), "error: boom");
    assert!(program.build(&[d1], "").is_err());
    assert!(program.devices().is_empty());
}

#[test]
fn partial_fetch_failure_keeps_other_logs() {
    let (api, mut program, handle) = failing_program();
    let d1 = api.device("GPU0");
    let d2 = api.device("GPU1");
    api.fail_build_log(handle, d1.id(), StatusError::OutOfHostMemory);
    api.set_build_log(handle, d2.id(), "error: undeclared identifier 'x'");

    let err = program.build(&[d1, d2], "").unwrap_err();
    assert!(err.is_build_log());
    let msg = err.to_string();
    let lines: Vec<&str> = msg.lines().collect();
    assert_eq!(
        lines,
        vec![
            "status=CL_BUILD_PROGRAM_FAILURE",
            "GPU0: <unable to fetch build log: CL_OUT_OF_HOST_MEMORY>",
            "GPU1:",
            "error: undeclared identifier 'x'",
        ]
    );
}

#[test]
fn all_clean_logs_fall_back_to_status() {
    let (api, mut program, handle) = failing_program();
    let d1 = api.device("GPU0");
    api.set_build_log(handle, d1.id(), "\n\n");

    let err = program.build(&[d1], "").unwrap_err();
    assert_eq!(err, Error::Status(StatusError::BuildProgramFailure));
}

#[test]
fn no_devices_anywhere_falls_back_to_status() {
    let (_api, mut program, _) = failing_program();
    let err = program.build(&[], "").unwrap_err();
    assert_eq!(err, Error::Status(StatusError::BuildProgramFailure));
}

#[test]
fn discovery_failure_yields_annotated_status_error() {
    let (api, mut program, handle) = failing_program();
    api.fail_program_info(handle, StatusError::OutOfResources);

    let err = program.build(&[], "").unwrap_err();
    assert!(!err.is_build_log());
    assert_eq!(
        err,
        Error::LogUnavailable { status: StatusError::BuildProgramFailure, reason: StatusError::OutOfResources }
    );
    let msg = err.to_string();
    assert!(msg.contains("CL_BUILD_PROGRAM_FAILURE"), "{msg}");
    assert!(msg.contains("CL_OUT_OF_RESOURCES"), "{msg}");
}

#[test]
fn cached_devices_from_earlier_build_are_consulted() {
    let api = Arc::new(FakeApi::new());
    let handle = api.add_program(&[]);
    let mut program = Program::from_raw(api.clone(), handle).unwrap();
    let d1 = api.device("GPU0");
    let d2 = api.device("GPU1");
    let d3 = api.device("GPU2");

    program.build(&[d2.clone(), d3.clone()], "").unwrap();

    api.fail_build(handle, StatusError::BuildProgramFailure);
    api.set_build_log(handle, d1.id(), "error: a");
    api.set_build_log(handle, d2.id(), "error: b");
    api.set_build_log(handle, d3.id(), "error: c");

    let err = program.build(&[d1, d2], "").unwrap_err();
    let Error::Build(build) = err else { panic!("expected composite build error") };
    assert_eq!(build.sections(), ["GPU0:\nerror: a", "GPU1:\nerror: b", "GPU2:\nerror: c"]);
}

#[test]
fn unresolvable_name_uses_identity_label() {
    let (api, mut program, handle) = failing_program();
    let d1 = api.add_device("GPU0");
    api.panic_on_device_name(d1);
    api.set_build_log(handle, d1, "error: x");

    let err = program.build(&[Device::new(d1)], "").unwrap_err();
    assert_eq!(err.to_string(), format!("status=CL_BUILD_PROGRAM_FAILURE\ndevice@{:#x}:\nerror: x", d1.as_raw()));
}

#[test]
fn prenamed_devices_skip_native_lookup() {
    let (api, mut program, handle) = failing_program();
    let d1 = api.add_device("from driver");
    api.set_build_log(handle, d1, "error: y");

    let err = program.build(&[Device::with_name(d1, "Arc A770")], "").unwrap_err();
    assert!(err.to_string().contains("Arc A770:\nerror: y"));
    assert_eq!(api.device_name_calls(), 0);
}

#[test]
fn unknown_status_is_preserved() {
    let (api, mut program, handle) = failing_program();
    api.fail_build(handle, StatusError::from_code(-1234));
    let err = program.build(&[], "").unwrap_err();
    assert_eq!(err.status(), StatusError::Unknown(-1234));
}

#[test]
fn failed_devices_report_error_build_status() {
    let (api, mut program, handle) = failing_program();
    let d1 = api.add_device("GPU0");
    let d2 = api.add_device("GPU1");
    api.set_associated_devices(handle, &[d1, d2]);

    assert!(program.build(&[], "").is_err());
    let statuses: Vec<BuildStatus> =
        [d1, d2].into_iter().map(|id| program.build_status(&Device::new(id)).unwrap()).collect();
    assert_eq!(statuses, vec![BuildStatus::Error, BuildStatus::Error]);
}
