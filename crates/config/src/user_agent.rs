use crate::version::WRAPPER_VERSION;
use crate::Config;

impl Config {
    /// The expanded user-agent string for this wrapper.
    pub fn user_agent(&self) -> String {
        self.user_agent_with(WRAPPER_VERSION)
    }

    /// Expand the user-agent template with an explicit `{VERSION}`.
    ///
    /// Recognised placeholders: `{APP_NAME}`, `{APP_NAME_DASH}`, `{APP_SLUG}`,
    /// `{VERSION}`, `{UNAME_S}` and `{UNAME_R}`.
    pub fn user_agent_with(&self, version: &str) -> String {
        let (sys, release) = uname();
        let app = &self.application;
        self.api
            .user_agent
            .replace("{APP_NAME_DASH}", &app.name.replace(' ', "-"))
            .replace("{APP_NAME}", &app.name)
            .replace("{APP_SLUG}", &app.slug)
            .replace("{VERSION}", version)
            .replace("{UNAME_S}", &sys)
            .replace("{UNAME_R}", &release)
    }
}

/// Operating system name and release.
#[cfg(unix)]
pub fn uname() -> (String, String) {
    use std::ffi::CStr;

    // SAFETY: utsname is plain data; uname fills it with NUL-terminated strings.
    let mut buf: libc::utsname = unsafe { std::mem::zeroed() };
    if unsafe { libc::uname(&mut buf) } != 0 {
        return (std::env::consts::OS.to_string(), String::new());
    }
    let sys = unsafe { CStr::from_ptr(buf.sysname.as_ptr()) }
        .to_string_lossy()
        .into_owned();
    let release = unsafe { CStr::from_ptr(buf.release.as_ptr()) }
        .to_string_lossy()
        .into_owned();
    (sys, release)
}

#[cfg(not(unix))]
pub fn uname() -> (String, String) {
    let sys = match std::env::consts::OS {
        "windows" => "Windows",
        other => other,
    };
    (sys.to_string(), String::new())
}
