//! Share table backed by the Windows NetApi (`lmshare.h`, `lmserver.h`)

use std::ffi::OsStr;
use std::os::windows::ffi::OsStrExt;
use std::path::PathBuf;
use std::ptr;

use windows_sys::Win32::NetworkManagement::NetManagement::{
    NetApiBufferFree, NetServerGetInfo, SERVER_INFO_100,
};
use windows_sys::Win32::Storage::FileSystem::{
    NetShareAdd, NetShareDel, NetShareEnum, NetShareGetInfo, SHARE_INFO_2,
};

use super::{NetApiError, Share, ShareTable};

const NERR_SUCCESS: u32 = 0;
const ERROR_MORE_DATA: u32 = 234;
const MAX_PREFERRED_LENGTH: u32 = u32::MAX;

/// The share table of the local machine
#[derive(Debug, Clone, Copy, Default)]
pub struct NetApiShareTable;

impl NetApiShareTable {
    pub fn new() -> Self {
        Self
    }
}

fn wide(s: &OsStr) -> Vec<u16> {
    s.encode_wide().chain(std::iter::once(0)).collect()
}

/// Read a NUL-terminated UTF-16 string owned by the NetApi buffer
unsafe fn from_wide(p: *const u16) -> String {
    if p.is_null() {
        return String::new();
    }
    let mut len = 0;
    while *p.add(len) != 0 {
        len += 1;
    }
    String::from_utf16_lossy(std::slice::from_raw_parts(p, len))
}

unsafe fn share_from_info(info: &SHARE_INFO_2) -> Share {
    Share {
        name: from_wide(info.shi2_netname),
        path: PathBuf::from(from_wide(info.shi2_path)),
        share_type: info.shi2_type,
        permissions: info.shi2_permissions,
        max_uses: info.shi2_max_uses,
        current_uses: info.shi2_current_uses,
        remark: from_wide(info.shi2_remark),
    }
}

fn check(operation: &'static str, code: u32) -> Result<(), NetApiError> {
    if code == NERR_SUCCESS {
        Ok(())
    } else {
        Err(NetApiError { operation, code })
    }
}

impl ShareTable for NetApiShareTable {
    fn server_name(&self) -> Result<String, NetApiError> {
        let mut buf: *mut u8 = ptr::null_mut();
        let code = unsafe { NetServerGetInfo(ptr::null(), 100, &mut buf) };
        check("NetServerGetInfo", code)?;

        let name = unsafe { from_wide((*(buf as *const SERVER_INFO_100)).sv100_name) };
        unsafe { NetApiBufferFree(buf as *const _) };
        Ok(name)
    }

    fn enumerate(&self) -> Result<Vec<Share>, NetApiError> {
        let mut shares = Vec::new();
        let mut resume: u32 = 0;

        loop {
            let mut buf: *mut u8 = ptr::null_mut();
            let mut read: u32 = 0;
            let mut total: u32 = 0;
            let code = unsafe {
                NetShareEnum(
                    ptr::null(),
                    2,
                    &mut buf,
                    MAX_PREFERRED_LENGTH,
                    &mut read,
                    &mut total,
                    &mut resume,
                )
            };

            if code != NERR_SUCCESS && code != ERROR_MORE_DATA {
                return Err(NetApiError {
                    operation: "NetShareEnum",
                    code,
                });
            }

            if !buf.is_null() {
                let infos =
                    unsafe { std::slice::from_raw_parts(buf as *const SHARE_INFO_2, read as usize) };
                shares.extend(infos.iter().map(|info| unsafe { share_from_info(info) }));
                unsafe { NetApiBufferFree(buf as *const _) };
            }

            if code == NERR_SUCCESS {
                return Ok(shares);
            }
        }
    }

    fn get(&self, name: &str) -> Result<Share, NetApiError> {
        let netname = wide(OsStr::new(name));
        let mut buf: *mut u8 = ptr::null_mut();
        let code = unsafe { NetShareGetInfo(ptr::null(), netname.as_ptr(), 2, &mut buf) };
        check("NetShareGetInfo", code)?;

        let share = unsafe { share_from_info(&*(buf as *const SHARE_INFO_2)) };
        unsafe { NetApiBufferFree(buf as *const _) };
        Ok(share)
    }

    fn add(&self, share: &Share) -> Result<(), NetApiError> {
        let mut netname = wide(OsStr::new(&share.name));
        let mut path = wide(share.path.as_os_str());
        let mut remark = wide(OsStr::new(&share.remark));
        let mut passwd = wide(OsStr::new(""));

        let info = SHARE_INFO_2 {
            shi2_netname: netname.as_mut_ptr(),
            shi2_type: share.share_type,
            shi2_remark: remark.as_mut_ptr(),
            shi2_permissions: share.permissions,
            shi2_max_uses: share.max_uses,
            shi2_current_uses: 0,
            shi2_path: path.as_mut_ptr(),
            shi2_passwd: passwd.as_mut_ptr(),
        };

        let mut parm_err: u32 = 0;
        let code = unsafe {
            NetShareAdd(
                ptr::null(),
                2,
                &info as *const SHARE_INFO_2 as *const u8,
                &mut parm_err,
            )
        };
        check("NetShareAdd", code)
    }

    fn delete(&self, name: &str) -> Result<(), NetApiError> {
        let netname = wide(OsStr::new(name));
        let code = unsafe { NetShareDel(ptr::null(), netname.as_ptr(), 0) };
        check("NetShareDel", code)
    }
}
