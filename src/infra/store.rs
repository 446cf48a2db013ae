use std::path::PathBuf;

use color_eyre::eyre::Result;
use heed::{Database, Env, EnvOpenOptions, types::*};
use serde::{Deserialize, Serialize};

use crate::{config::get_data_dir, domain::address_type::AddressType};

const ADDRESS_TYPE_KEY: &str = "address_type";
const NETWORK_KEY: &str = "network";

/// Wrapper around LMDB database for persistent user preferences.
#[derive(Clone)]
pub struct Store {
    env: Env,
}

impl Store {
    pub fn new() -> Result<Self> {
        Self::with_path(get_data_dir().join("preferences.mdb"))
    }

    pub fn with_path(path: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&path)?;
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(1024 * 1024) // 1MB
                .max_dbs(2)
                .open(path)?
        };
        Ok(Self { env })
    }

    /// Preferred receive address format. Defaults to segwit and persists the
    /// default on first read.
    pub fn address_type(&self) -> Result<AddressType> {
        match self.load_preference::<AddressType>(ADDRESS_TYPE_KEY)? {
            Some(address_type) => Ok(address_type),
            None => {
                let address_type = AddressType::default();
                self.set_address_type(address_type)?;
                Ok(address_type)
            }
        }
    }

    pub fn set_address_type(&self, address_type: AddressType) -> Result<()> {
        self.save_preference(ADDRESS_TYPE_KEY, &address_type)
    }

    /// Last selected network, if any.
    pub fn network(&self) -> Result<Option<String>> {
        self.load_preference(NETWORK_KEY)
    }

    pub fn set_network(&self, network: &str) -> Result<()> {
        self.save_preference(NETWORK_KEY, &network.to_string())
    }

    fn save_preference<T: Serialize + 'static>(&self, key: &str, value: &T) -> Result<()> {
        let mut wtxn = self.env.write_txn()?;
        let db: Database<Str, SerdeRmp<T>> =
            self.env.create_database(&mut wtxn, Some("preferences"))?;
        db.put(&mut wtxn, key, value)?;
        wtxn.commit()?;
        Ok(())
    }

    fn load_preference<T: for<'de> Deserialize<'de> + 'static>(
        &self,
        key: &str,
    ) -> Result<Option<T>> {
        let rtxn = self.env.read_txn()?;
        let db: Option<Database<Str, SerdeRmp<T>>> =
            self.env.open_database(&rtxn, Some("preferences"))?;

        match db {
            Some(db) => Ok(db.get(&rtxn, key)?),
            None => Ok(None),
        }
    }
}
