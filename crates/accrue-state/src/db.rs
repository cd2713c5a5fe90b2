use std::path::Path;

use accrue_core::error::IncentivesError;
use accrue_core::gauge::{Gauge, GaugeState};
use accrue_core::group::Group;
use accrue_core::params::Params;
use accrue_core::types::{GaugeId, Timestamp};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::transaction::{ConflictableTransactionError, TransactionError, Transactional};
use tracing::debug;

const META_LAST_GAUGE_ID: &str = "last_gauge_id";
const META_PARAMS: &str = "params";

/// Persistent gauge database backed by sled.
///
/// Named trees:
///   gauges    — GaugeId BE            → bincode(Gauge)
///   upcoming  — time key ‖ GaugeId BE → [] (membership set)
///   active    — time key ‖ GaugeId BE → []
///   finished  — time key ‖ GaugeId BE → []
///   denoms    — denom ‖ 0x00 ‖ GaugeId BE → []
///   groups    — GaugeId BE            → bincode(Group)
///   meta      — utf8 key bytes        → raw bytes
///
/// The time key is the start time with its sign bit flipped, big-endian, so
/// index iteration yields gauges in (start time, id) order. No business rules
/// live here: callers decide which index a gauge belongs in.
pub struct GaugeStore {
    _db: sled::Db,
    gauges: sled::Tree,
    upcoming: sled::Tree,
    active: sled::Tree,
    finished: sled::Tree,
    denoms: sled::Tree,
    groups: sled::Tree,
    meta: sled::Tree,
}

fn storage(e: sled::Error) -> IncentivesError {
    IncentivesError::Storage(e.to_string())
}

fn tx_storage(e: TransactionError<()>) -> IncentivesError {
    IncentivesError::Storage(format!("{:?}", e))
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, IncentivesError> {
    bincode::serialize(value).map_err(|e| IncentivesError::Serialization(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, IncentivesError> {
    bincode::deserialize(bytes).map_err(|e| IncentivesError::Serialization(e.to_string()))
}

fn id_key(id: GaugeId) -> [u8; 8] {
    id.to_be_bytes()
}

fn id_from_suffix(key: &[u8]) -> Result<GaugeId, IncentivesError> {
    if key.len() < 8 {
        return Err(IncentivesError::Storage(format!("short index key: {} bytes", key.len())));
    }
    let mut arr = [0u8; 8];
    arr.copy_from_slice(&key[key.len() - 8..]);
    Ok(GaugeId::from_be_bytes(arr))
}

/// Order-preserving encoding of `(start_time, id)`.
fn index_key(start_time: Timestamp, id: GaugeId) -> Vec<u8> {
    let mut key = Vec::with_capacity(16);
    key.extend_from_slice(&((start_time as u64) ^ (1 << 63)).to_be_bytes());
    key.extend_from_slice(&id.to_be_bytes());
    key
}

fn denom_prefix(denom: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(denom.len() + 1);
    key.extend_from_slice(denom.as_bytes());
    key.push(0);
    key
}

fn denom_key(denom: &str, id: GaugeId) -> Vec<u8> {
    let mut key = denom_prefix(denom);
    key.extend_from_slice(&id.to_be_bytes());
    key
}

impl GaugeStore {
    /// Open or create the gauge database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, IncentivesError> {
        let db = sled::open(path).map_err(storage)?;
        Self::from_db(db)
    }

    /// Throwaway in-memory store; removed when dropped.
    pub fn temporary() -> Result<Self, IncentivesError> {
        let db = sled::Config::new().temporary(true).open().map_err(storage)?;
        Self::from_db(db)
    }

    fn from_db(db: sled::Db) -> Result<Self, IncentivesError> {
        let gauges   = db.open_tree("gauges").map_err(storage)?;
        let upcoming = db.open_tree("upcoming").map_err(storage)?;
        let active   = db.open_tree("active").map_err(storage)?;
        let finished = db.open_tree("finished").map_err(storage)?;
        let denoms   = db.open_tree("denoms").map_err(storage)?;
        let groups   = db.open_tree("groups").map_err(storage)?;
        let meta     = db.open_tree("meta").map_err(storage)?;
        Ok(Self { _db: db, gauges, upcoming, active, finished, denoms, groups, meta })
    }

    fn index(&self, state: GaugeState) -> &sled::Tree {
        match state {
            GaugeState::Upcoming => &self.upcoming,
            GaugeState::Active => &self.active,
            GaugeState::Finished => &self.finished,
        }
    }

    // ── Gauges ───────────────────────────────────────────────────────────────

    pub fn get_gauge(&self, id: GaugeId) -> Result<Option<Gauge>, IncentivesError> {
        match self.gauges.get(id_key(id)).map_err(storage)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn put_gauge(&self, gauge: &Gauge) -> Result<(), IncentivesError> {
        let bytes = encode(gauge)?;
        self.gauges.insert(id_key(gauge.id), bytes).map_err(storage)?;
        Ok(())
    }

    /// Writes every gauge in one transaction.
    pub fn put_gauges(&self, gauges: &[Gauge]) -> Result<(), IncentivesError> {
        let mut rows = Vec::with_capacity(gauges.len());
        for gauge in gauges {
            rows.push((id_key(gauge.id).to_vec(), encode(gauge)?));
        }
        self.gauges
            .transaction(|tree| {
                for (key, bytes) in &rows {
                    tree.insert(key.clone(), bytes.clone())?;
                }
                Ok::<_, ConflictableTransactionError<()>>(())
            })
            .map_err(tx_storage)
    }

    pub fn gauge_exists(&self, id: GaugeId) -> bool {
        self.gauges.contains_key(id_key(id)).unwrap_or(false)
    }

    /// Every stored gauge in id order.
    pub fn gauges(&self) -> Result<Vec<Gauge>, IncentivesError> {
        let mut out = Vec::new();
        for item in self.gauges.iter() {
            let (_, bytes) = item.map_err(storage)?;
            out.push(decode(&bytes)?);
        }
        Ok(out)
    }

    // ── State indices ────────────────────────────────────────────────────────

    pub fn add_ref(
        &self,
        state: GaugeState,
        start_time: Timestamp,
        id: GaugeId,
    ) -> Result<(), IncentivesError> {
        self.index(state)
            .insert(index_key(start_time, id), b"".as_ref())
            .map_err(storage)?;
        Ok(())
    }

    pub fn remove_ref(
        &self,
        state: GaugeState,
        start_time: Timestamp,
        id: GaugeId,
    ) -> Result<(), IncentivesError> {
        self.index(state)
            .remove(index_key(start_time, id))
            .map_err(storage)?;
        Ok(())
    }

    pub fn has_ref(&self, state: GaugeState, start_time: Timestamp, id: GaugeId) -> bool {
        self.index(state)
            .contains_key(index_key(start_time, id))
            .unwrap_or(false)
    }

    /// Atomically moves a reference between two indices.
    pub fn move_ref(
        &self,
        from: GaugeState,
        to: GaugeState,
        start_time: Timestamp,
        id: GaugeId,
    ) -> Result<(), IncentivesError> {
        let key = index_key(start_time, id);
        (self.index(from), self.index(to))
            .transaction(|(src, dst)| {
                src.remove(key.clone())?;
                dst.insert(key.clone(), Vec::new())?;
                Ok::<_, ConflictableTransactionError<()>>(())
            })
            .map_err(tx_storage)?;
        debug!(gauge_id = id, %from, %to, "moved gauge reference");
        Ok(())
    }

    /// Gauge ids in `state`, ordered by (start time, id).
    pub fn ids_in(&self, state: GaugeState) -> Result<Vec<GaugeId>, IncentivesError> {
        let mut ids = Vec::new();
        for item in self.index(state).iter() {
            let (key, _) = item.map_err(storage)?;
            ids.push(id_from_suffix(&key)?);
        }
        Ok(ids)
    }

    /// Gauges in `state`, ordered by (start time, id).
    pub fn gauges_in(&self, state: GaugeState) -> Result<Vec<Gauge>, IncentivesError> {
        self.ids_in(state)?
            .into_iter()
            .map(|id| self.get_gauge(id)?.ok_or(IncentivesError::GaugeNotFound(id)))
            .collect()
    }

    // ── Denomination index ───────────────────────────────────────────────────

    pub fn add_denom_ref(&self, denom: &str, id: GaugeId) -> Result<(), IncentivesError> {
        self.denoms
            .insert(denom_key(denom, id), b"".as_ref())
            .map_err(storage)?;
        Ok(())
    }

    pub fn remove_denom_ref(&self, denom: &str, id: GaugeId) -> Result<(), IncentivesError> {
        self.denoms.remove(denom_key(denom, id)).map_err(storage)?;
        Ok(())
    }

    /// Ids of gauges referenced under `denom`, ascending.
    pub fn ids_by_denom(&self, denom: &str) -> Result<Vec<GaugeId>, IncentivesError> {
        let mut ids = Vec::new();
        for item in self.denoms.scan_prefix(denom_prefix(denom)) {
            let (key, _) = item.map_err(storage)?;
            ids.push(id_from_suffix(&key)?);
        }
        Ok(ids)
    }

    // ── Groups ───────────────────────────────────────────────────────────────

    pub fn get_group(&self, id: GaugeId) -> Result<Option<Group>, IncentivesError> {
        match self.groups.get(id_key(id)).map_err(storage)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn put_group(&self, group: &Group) -> Result<(), IncentivesError> {
        let bytes = encode(group)?;
        self.groups
            .insert(id_key(group.group_gauge_id), bytes)
            .map_err(storage)?;
        Ok(())
    }

    /// Raw encoded group, for callers that need to compare stored bytes.
    pub fn group_bytes(&self, id: GaugeId) -> Result<Option<Vec<u8>>, IncentivesError> {
        self.groups
            .get(id_key(id))
            .map(|v| v.map(|iv| iv.to_vec()))
            .map_err(storage)
    }

    /// Every stored group in id order.
    pub fn groups(&self) -> Result<Vec<Group>, IncentivesError> {
        let mut out = Vec::new();
        for item in self.groups.iter() {
            let (_, bytes) = item.map_err(storage)?;
            out.push(decode(&bytes)?);
        }
        Ok(out)
    }

    /// Writes a group, its gauge and the gauge's `state` reference in one
    /// transaction.
    pub fn insert_group_pair(
        &self,
        gauge: &Gauge,
        group: &Group,
        state: GaugeState,
    ) -> Result<(), IncentivesError> {
        if gauge.id != group.group_gauge_id {
            return Err(IncentivesError::UnpairedGroup { group_id: group.group_gauge_id });
        }
        let gauge_bytes = encode(gauge)?;
        let group_bytes = encode(group)?;
        let id = id_key(gauge.id).to_vec();
        let ref_key = index_key(gauge.start_time, gauge.id);
        (&self.gauges, &self.groups, self.index(state))
            .transaction(|(gauges, groups, index)| {
                gauges.insert(id.clone(), gauge_bytes.clone())?;
                groups.insert(id.clone(), group_bytes.clone())?;
                index.insert(ref_key.clone(), Vec::new())?;
                Ok::<_, ConflictableTransactionError<()>>(())
            })
            .map_err(tx_storage)
    }

    /// Deletes a group, its gauge and the gauge's `state` reference in one
    /// transaction.
    pub fn delete_group_pair(
        &self,
        gauge: &Gauge,
        state: GaugeState,
    ) -> Result<(), IncentivesError> {
        let id = id_key(gauge.id).to_vec();
        let ref_key = index_key(gauge.start_time, gauge.id);
        (&self.gauges, &self.groups, self.index(state))
            .transaction(|(gauges, groups, index)| {
                gauges.remove(id.clone())?;
                groups.remove(id.clone())?;
                index.remove(ref_key.clone())?;
                Ok::<_, ConflictableTransactionError<()>>(())
            })
            .map_err(tx_storage)
    }

    // ── Meta ─────────────────────────────────────────────────────────────────

    pub fn last_gauge_id(&self) -> Result<GaugeId, IncentivesError> {
        match self.meta.get(META_LAST_GAUGE_ID).map_err(storage)? {
            Some(bytes) => id_from_suffix(&bytes),
            None => Ok(0),
        }
    }

    pub fn set_last_gauge_id(&self, id: GaugeId) -> Result<(), IncentivesError> {
        self.meta
            .insert(META_LAST_GAUGE_ID, id_key(id).to_vec())
            .map_err(storage)?;
        Ok(())
    }

    /// Stored params, or the defaults if none were ever stored.
    pub fn params(&self) -> Result<Params, IncentivesError> {
        match self.meta.get(META_PARAMS).map_err(storage)? {
            Some(bytes) => decode(&bytes),
            None => Ok(Params::default()),
        }
    }

    pub fn put_params(&self, params: &Params) -> Result<(), IncentivesError> {
        let bytes = encode(params)?;
        self.meta.insert(META_PARAMS, bytes).map_err(storage)?;
        Ok(())
    }

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> Result<(), IncentivesError> {
        self._db.flush().map_err(storage)?;
        Ok(())
    }
}
