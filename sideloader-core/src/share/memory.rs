//! In-memory share table
//!
//! Behaves like the Windows share table, down to the NetApi error codes
//! and case-insensitive share names, so the lifecycle can be exercised on
//! any platform. Clones share state.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use super::{NetApiError, Share, ShareTable, NERR_DUPLICATE_SHARE, NERR_NET_NAME_NOT_FOUND};

/// Share names are compared without regard to case
fn key(name: &str) -> String {
    name.to_lowercase()
}

#[derive(Debug, Default)]
struct State {
    shares: BTreeMap<String, Share>,
    failure: Option<NetApiError>,
}

/// A share table held in memory
#[derive(Debug, Clone)]
pub struct MemoryShareTable {
    server: String,
    state: Rc<RefCell<State>>,
}

impl MemoryShareTable {
    pub fn new(server: &str) -> Self {
        Self {
            server: server.to_string(),
            state: Rc::default(),
        }
    }

    /// Insert a record directly, bypassing duplicate checks
    pub fn insert(&self, share: Share) {
        self.state
            .borrow_mut()
            .shares
            .insert(key(&share.name), share);
    }

    /// Make the next call to `operation` fail with `code`
    pub fn fail_on(&self, operation: &'static str, code: u32) {
        self.state.borrow_mut().failure = Some(NetApiError { operation, code });
    }

    fn check(&self, operation: &'static str) -> Result<(), NetApiError> {
        let mut state = self.state.borrow_mut();
        if let Some(failure) = state.failure.filter(|f| f.operation == operation) {
            state.failure = None;
            return Err(failure);
        }
        Ok(())
    }
}

impl ShareTable for MemoryShareTable {
    fn server_name(&self) -> Result<String, NetApiError> {
        self.check("NetServerGetInfo")?;
        Ok(self.server.clone())
    }

    fn enumerate(&self) -> Result<Vec<Share>, NetApiError> {
        self.check("NetShareEnum")?;
        Ok(self.state.borrow().shares.values().cloned().collect())
    }

    fn get(&self, name: &str) -> Result<Share, NetApiError> {
        self.check("NetShareGetInfo")?;
        self.state
            .borrow()
            .shares
            .get(&key(name))
            .cloned()
            .ok_or(NetApiError {
                operation: "NetShareGetInfo",
                code: NERR_NET_NAME_NOT_FOUND,
            })
    }

    fn add(&self, share: &Share) -> Result<(), NetApiError> {
        self.check("NetShareAdd")?;
        let mut state = self.state.borrow_mut();
        if state.shares.contains_key(&key(&share.name)) {
            return Err(NetApiError {
                operation: "NetShareAdd",
                code: NERR_DUPLICATE_SHARE,
            });
        }
        state.shares.insert(key(&share.name), share.clone());
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<(), NetApiError> {
        self.check("NetShareDel")?;
        match self.state.borrow_mut().shares.remove(&key(name)) {
            Some(_) => Ok(()),
            None => Err(NetApiError {
                operation: "NetShareDel",
                code: NERR_NET_NAME_NOT_FOUND,
            }),
        }
    }
}
