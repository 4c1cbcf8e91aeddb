//! MAC-signed JSON records
//!
//! Stored value format: `<payload json>.<hex keyed-blake3 of payload>`. The
//! MAC is hex, so splitting on the last `.` is unambiguous.

use rand::Rng;
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::PersistError;
use super::store::KeyValueStore;

const DEVICE_KEY: &str = "sv_key_v1";
const PREFIX: &str = "sv_signed:";

pub struct SignedStore<K: KeyValueStore> {
    store: K,
    key: [u8; 32],
}

impl<K: KeyValueStore> SignedStore<K> {
    /// Open with the stored device key, creating one if missing or unreadable
    pub fn open<R: Rng + ?Sized>(mut store: K, rng: &mut R) -> Self {
        let existing = match store.get(DEVICE_KEY) {
            Ok(raw) => raw.and_then(|hex| blake3::Hash::from_hex(hex.trim()).ok()),
            Err(e) => {
                log::warn!("device key unreadable: {e}");
                None
            }
        };
        let key = match existing {
            Some(hash) => *hash.as_bytes(),
            None => {
                let mut key = [0u8; 32];
                rng.fill(&mut key);
                let hex = blake3::Hash::from_bytes(key).to_hex();
                if let Err(e) = store.set(DEVICE_KEY, hex.as_str()) {
                    log::warn!("device key not persisted: {e}");
                }
                log::debug!("generated new device key");
                key
            }
        };
        Self { store, key }
    }

    pub fn inner(&self) -> &K {
        &self.store
    }

    pub fn inner_mut(&mut self) -> &mut K {
        &mut self.store
    }

    fn mac(&self, payload: &str) -> blake3::Hash {
        blake3::keyed_hash(&self.key, payload.as_bytes())
    }

    pub fn save<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> Result<(), PersistError> {
        let payload = serde_json::to_string(value)?;
        let signed = format!("{payload}.{}", self.mac(&payload).to_hex());
        self.store.set(&format!("{PREFIX}{key}"), &signed)
    }

    /// `Ok(None)` when absent; errors when tampered or malformed
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, PersistError> {
        let Some(raw) = self.store.get(&format!("{PREFIX}{key}"))? else {
            return Ok(None);
        };
        let tampered = || PersistError::Tampered(key.to_string());
        let (payload, mac) = raw.rsplit_once('.').ok_or_else(tampered)?;
        let mac = blake3::Hash::from_hex(mac).map_err(|_| tampered())?;
        // Hash equality is constant-time
        if mac != self.mac(payload) {
            return Err(tampered());
        }
        Ok(Some(serde_json::from_str(payload)?))
    }

    /// Load a record, treating absence and corruption as `fallback`
    pub fn load_or<T: DeserializeOwned>(&self, key: &str, fallback: T) -> T {
        match self.load(key) {
            Ok(Some(value)) => value,
            Ok(None) => fallback,
            Err(e) => {
                log::warn!("discarding stored {key:?}: {e}");
                fallback
            }
        }
    }

    pub fn remove(&mut self, key: &str) -> Result<(), PersistError> {
        self.store.remove(&format!("{PREFIX}{key}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryStore;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Rec {
        a: u32,
        b: f32,
    }

    fn open(store: MemoryStore) -> SignedStore<MemoryStore> {
        SignedStore::open(store, &mut Pcg32::seed_from_u64(9))
    }

    #[test]
    fn test_roundtrip_with_dots_in_payload() {
        let mut s = open(MemoryStore::new());
        s.save("rec", &Rec { a: 3, b: 1.25 }).unwrap();
        assert_eq!(s.load::<Rec>("rec").unwrap(), Some(Rec { a: 3, b: 1.25 }));
        assert_eq!(s.load::<Rec>("missing").unwrap(), None);
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let mut s = open(MemoryStore::new());
        s.save("rec", &Rec { a: 3, b: 0.5 }).unwrap();
        let raw = s.inner().get("sv_signed:rec").unwrap().unwrap();
        let forged = raw.replacen("\"a\":3", "\"a\":999", 1);
        s.inner_mut().set("sv_signed:rec", &forged).unwrap();

        assert!(matches!(s.load::<Rec>("rec"), Err(PersistError::Tampered(_))));
        assert_eq!(s.load_or("rec", Rec { a: 0, b: 0.0 }), Rec { a: 0, b: 0.0 });
    }

    #[test]
    fn test_garbage_falls_back() {
        let mut s = open(MemoryStore::new());
        s.inner_mut().set("sv_signed:rec", "no signature here").unwrap();
        assert_eq!(s.load_or("rec", 7u32), 7);
        s.inner_mut().set("sv_signed:rec", "{}.zz").unwrap();
        assert_eq!(s.load_or("rec", 7u32), 7);
    }

    #[test]
    fn test_device_key_persists_across_opens() {
        let mut s = open(MemoryStore::new());
        s.save("n", &42u32).unwrap();
        let store = s.inner().clone();

        let reopened = SignedStore::open(store, &mut Pcg32::seed_from_u64(1234));
        assert_eq!(reopened.load::<u32>("n").unwrap(), Some(42));
    }

    #[test]
    fn test_foreign_key_cannot_read() {
        let mut s = open(MemoryStore::new());
        s.save("n", &42u32).unwrap();
        let mut store = s.inner().clone();
        store.remove(DEVICE_KEY).unwrap();

        let other = SignedStore::open(store, &mut Pcg32::seed_from_u64(1234));
        assert_eq!(other.load_or("n", 0u32), 0);
    }

    #[test]
    fn test_valid_mac_bad_json_is_malformed() {
        let mut s = open(MemoryStore::new());
        s.save("n", &42u32).unwrap();
        assert!(matches!(s.load::<Rec>("n"), Err(PersistError::Malformed(_))));
    }
}
