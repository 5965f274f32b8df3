//! Build-log aggregation for failed builds.
//!
//! When a build fails the native status alone rarely tells the caller
//! what went wrong. This module finds the devices worth asking, pulls
//! each device's compiler log, and folds the useful ones into a single
//! [`BuildError`]. Collection is best effort: a failure to fetch one log
//! becomes a line of text, and nothing here replaces the build status as
//! the operative error.

use std::collections::HashSet;

use tracing::debug;

use crate::device::{Device, DeviceId};
use crate::error::{BuildError, Error};
use crate::program::Program;
use crate::status::StatusError;

/// Resolve the devices whose logs describe a failed build.
///
/// Requested devices come first, then previously cached ones, keeping the
/// first occurrence of each identity and skipping null devices. Only if
/// that yields nothing is `discover` consulted; its failure fails the
/// whole resolution.
pub fn resolve_log_devices<F>(
    requested: &[Device],
    cached: &[Device],
    discover: F,
) -> Result<Vec<Device>, StatusError>
where
    F: FnOnce() -> Result<Vec<Device>, StatusError>,
{
    let mut seen: HashSet<DeviceId> = HashSet::new();
    let mut resolved = Vec::new();
    extend_unique(&mut seen, &mut resolved, requested);
    extend_unique(&mut seen, &mut resolved, cached);
    if resolved.is_empty() {
        extend_unique(&mut seen, &mut resolved, &discover()?);
    }
    Ok(resolved)
}

fn extend_unique(seen: &mut HashSet<DeviceId>, resolved: &mut Vec<Device>, devices: &[Device]) {
    for device in devices {
        if !device.id().is_null() && seen.insert(device.id()) {
            resolved.push(device.clone());
        }
    }
}

/// Collect one text section per device with something to report.
///
/// Devices whose log is blank after trimming contribute nothing.
pub(crate) fn collect_sections(program: &Program, devices: &[Device]) -> Vec<String> {
    let api = program.api();
    let mut sections = Vec::with_capacity(devices.len());
    for device in devices {
        let label = device.label(api);
        match program.build_log(device) {
            Ok(log) => {
                let log = log.trim();
                if !log.is_empty() {
                    sections.push(format!("{label}:\n{log}"));
                }
            }
            Err(err) => sections.push(format!("{label}: <unable to fetch build log: {err}>")),
        }
    }
    sections
}

/// Turn a native build failure into the richest error available.
pub(crate) fn build_failure(program: &Program, status: StatusError, requested: &[Device]) -> Error {
    let devices = match resolve_log_devices(requested, program.devices(), || program.associated_devices()) {
        Ok(devices) => devices,
        Err(reason) => {
            debug!(%status, %reason, "no devices to fetch build logs from");
            return Error::LogUnavailable { status, reason };
        }
    };

    let sections = collect_sections(program, &devices);
    debug!(%status, devices = devices.len(), sections = sections.len(), "collected build logs");
    if sections.is_empty() {
        return Error::Status(status);
    }
    BuildError::new(status, sections).into()
}
