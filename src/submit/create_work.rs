use std::process::Command;
use std::thread;
use std::time::Duration;

use log::info;

use crate::config::ProjectDir;
use crate::error::WorkgenError;

/// One workunit handed to the platform's registration mechanism.
///
/// Template and archive paths are project-relative; the command runs from the
/// project root.
pub struct RegistrationRequest<'a> {
    pub app_name: &'a str,
    pub workunit_name: &'a str,
    pub input_template: &'a str,
    pub result_template: &'a str,
    /// Delivery archive plus the three staged ancillary archives, in slot order.
    pub archives: [&'a str; 4],
}

/// Register one workunit with the platform.
///
/// The call is synchronous and its exit status is logged but not acted on:
/// the registrar's queue is the authoritative record of submission, and a
/// re-run allocates fresh ids rather than retrying a name.
pub fn register(
    project: &ProjectDir,
    request: &RegistrationRequest,
    delay: Duration,
) -> Result<(), WorkgenError> {
    thread::sleep(delay);

    let mut create_work = Command::new("./bin/create_work");
    let cmd = create_work
        .current_dir(&project.path)
        .args(["-appname", request.app_name])
        .args(["-wu_name", request.workunit_name])
        .args(["-wu_template", request.input_template])
        .args(["-result_template", request.result_template])
        .args(request.archives);

    info!("Running create_work process");
    info!("{:?}", &cmd);
    let status = cmd.status()?;
    info!("create_work exited with {status}");

    Ok(())
}
