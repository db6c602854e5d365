use windows::Win32::Foundation::{CloseHandle, HANDLE};

/// A raw handle that is closed on every exit path, including failure branches.
#[derive(Debug)]
pub(crate) struct OwnedHandle(HANDLE);

impl OwnedHandle {
    pub(crate) fn new(handle: HANDLE) -> Self {
        Self(handle)
    }

    pub(crate) fn get(&self) -> HANDLE {
        self.0
    }
}

impl Drop for OwnedHandle {
    fn drop(&mut self) {
        // SAFETY: The handle was opened by this module and is closed exactly once, here.
        let _ = unsafe { CloseHandle(self.0) };
    }
}
