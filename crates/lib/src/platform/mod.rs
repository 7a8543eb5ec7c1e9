//! Host platform queries: data directories and privilege level.

pub mod paths;

/// Returns true when the current process runs with administrator/root rights.
#[cfg(unix)]
pub fn is_elevated() -> bool {
  rustix::process::geteuid().is_root()
}

/// Returns true when the current process runs with administrator/root rights.
#[cfg(windows)]
pub fn is_elevated() -> bool {
  use windows_sys::Win32::Foundation::{CloseHandle, HANDLE};
  use windows_sys::Win32::Security::{GetTokenInformation, TOKEN_ELEVATION, TOKEN_QUERY, TokenElevation};
  use windows_sys::Win32::System::Threading::{GetCurrentProcess, OpenProcessToken};

  // SAFETY: the token handle is checked before use and closed on every path.
  unsafe {
    let mut token: HANDLE = std::ptr::null_mut();
    if OpenProcessToken(GetCurrentProcess(), TOKEN_QUERY, &mut token) == 0 {
      return false;
    }

    let mut elevation = TOKEN_ELEVATION { TokenIsElevated: 0 };
    let mut size = 0u32;
    let ok = GetTokenInformation(
      token,
      TokenElevation,
      &mut elevation as *mut TOKEN_ELEVATION as *mut core::ffi::c_void,
      std::mem::size_of::<TOKEN_ELEVATION>() as u32,
      &mut size,
    );
    CloseHandle(token);

    ok != 0 && elevation.TokenIsElevated != 0
  }
}
