// Copyright 2021 Beacon Labs.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::collections::HashMap;

use async_trait::async_trait;
use beacon_types::AppMeta;
use beacon_types::ConfigMeta;
use beacon_types::ErrCode;
use beacon_types::InstanceMeta;
use beacon_types::MetaId;
use beacon_types::NamingRequest;
use beacon_types::NamingResponse;
use beacon_types::PrivilegeChange;
use beacon_types::RegistryApplied;
use beacon_types::RegistryCmd;
use beacon_types::ServletMeta;
use beacon_types::UserPrivilege;
use beacon_types::ZoneMeta;
use common_exception::Result;
use common_sled_store::get_sled_db;
use common_sled_store::SledTree;
use common_tracing::tracing;
use semver::Version;
use serde::Deserialize;
use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;

use crate::config::RaftConfig;
use crate::state_machine::keys;
use crate::state_machine::GroupStateMachine;

/// Hex sha-256 of a clear-text password; the only form ever stored.
pub fn hash_password(password: &str) -> String {
    let digest = Sha256::digest(password.as_bytes());
    let mut s = String::with_capacity(digest.len() * 2);
    for b in digest {
        s.push_str(&format!("{:02x}", b));
    }
    s
}

/// Snapshot payload of the registry: the full column family, in key order.
#[derive(Serialize, Deserialize, Debug, Default, Clone)]
pub struct SerializableSnapshot {
    pub kvs: Vec<(Vec<u8>, Vec<u8>)>,
}

/// The registry state machine.
///
/// All schema state lives twice: materialized in the sled column family
/// (the `keys` layout) and projected into in-memory indexes serving the
/// query path. `apply_cmd` keeps both in step: the KV batch commits
/// first, atomically, then the indexes are updated; readers never observe
/// one without the other because both happen under the machine's write
/// lock.
pub struct RegistrySm {
    /// The materialized column family.
    pub db: SledTree,

    max_app_id: MetaId,
    max_zone_id: MetaId,
    max_servlet_id: MetaId,
    max_instance_id: MetaId,
    max_config_id: MetaId,

    // app name -> id, id -> meta, id -> child zone ids
    app_ids: HashMap<String, MetaId>,
    apps: HashMap<MetaId, AppMeta>,
    zones_of_app: HashMap<MetaId, BTreeSet<MetaId>>,

    // (app, zone) -> id, id -> meta, id -> child servlet ids
    zone_ids: HashMap<(String, String), MetaId>,
    zones: HashMap<MetaId, ZoneMeta>,
    servlets_of_zone: HashMap<MetaId, BTreeSet<MetaId>>,

    // (app, zone, servlet) -> id, id -> meta
    servlet_ids: HashMap<(String, String, String), MetaId>,
    servlets: HashMap<MetaId, ServletMeta>,

    // address -> meta, plus the three prefix indexes
    instances: BTreeMap<String, InstanceMeta>,
    instances_of_app: HashMap<String, BTreeSet<String>>,
    instances_of_zone: HashMap<(String, String), BTreeSet<String>>,
    instances_of_servlet: HashMap<(String, String, String), BTreeSet<String>>,

    users: BTreeMap<String, UserPrivilege>,

    // config name -> version -> meta; BTreeMap keeps semver order
    configs: HashMap<String, BTreeMap<Version, ConfigMeta>>,
}

impl RegistrySm {
    pub async fn open(config: &RaftConfig) -> Result<RegistrySm> {
        let db = get_sled_db();
        let tree = SledTree::open(&db, config.tree_name("registry"), config.is_sync())?;

        let mut sm = RegistrySm {
            db: tree,
            max_app_id: 0,
            max_zone_id: 0,
            max_servlet_id: 0,
            max_instance_id: 0,
            max_config_id: 0,
            app_ids: Default::default(),
            apps: Default::default(),
            zones_of_app: Default::default(),
            zone_ids: Default::default(),
            zones: Default::default(),
            servlets_of_zone: Default::default(),
            servlet_ids: Default::default(),
            servlets: Default::default(),
            instances: Default::default(),
            instances_of_app: Default::default(),
            instances_of_zone: Default::default(),
            instances_of_servlet: Default::default(),
            users: Default::default(),
            configs: Default::default(),
        };

        sm.load_from_db()?;
        Ok(sm)
    }

    /// Rebuild every in-memory index from the column family.
    /// Called on open and after a snapshot install.
    pub fn load_from_db(&mut self) -> Result<()> {
        self.clear_memory();

        if let Some(v) = self.db.get_raw(&keys::max_app_id_key())? {
            self.max_app_id = keys::parse_i64(&v)?;
        }
        if let Some(v) = self.db.get_raw(&keys::max_zone_id_key())? {
            self.max_zone_id = keys::parse_i64(&v)?;
        }
        if let Some(v) = self.db.get_raw(&keys::max_servlet_id_key())? {
            self.max_servlet_id = keys::parse_i64(&v)?;
        }
        if let Some(v) = self.db.get_raw(&keys::max_instance_id_key())? {
            self.max_instance_id = keys::parse_i64(&v)?;
        }
        if let Some(v) = self.db.get_raw(&keys::max_config_id_key())? {
            self.max_config_id = keys::parse_i64(&v)?;
        }

        for (_k, v) in self.db.scan_prefix_raw(&keys::app_prefix())? {
            let app: AppMeta = serde_json::from_slice(&v)?;
            self.index_app(app);
        }
        for (_k, v) in self.db.scan_prefix_raw(&keys::zone_prefix())? {
            let zone: ZoneMeta = serde_json::from_slice(&v)?;
            self.index_zone(zone);
        }
        for (_k, v) in self.db.scan_prefix_raw(&keys::servlet_prefix())? {
            let servlet: ServletMeta = serde_json::from_slice(&v)?;
            self.index_servlet(servlet);
        }
        for (_k, v) in self.db.scan_prefix_raw(&keys::user_prefix())? {
            let user: UserPrivilege = serde_json::from_slice(&v)?;
            self.users.insert(user.username.clone(), user);
        }
        for (_k, v) in self.db.scan_prefix_raw(&keys::instance_prefix())? {
            let instance: InstanceMeta = serde_json::from_slice(&v)?;
            self.index_instance(instance);
        }
        for (_k, v) in self.db.scan_prefix_raw(&keys::config_prefix())? {
            let config: ConfigMeta = serde_json::from_slice(&v)?;
            self.configs
                .entry(config.config_name.clone())
                .or_default()
                .insert(config.version.clone(), config);
        }

        tracing::debug!(
            "registry loaded: {} apps, {} zones, {} servlets, {} instances, {} users, {} configs",
            self.apps.len(),
            self.zones.len(),
            self.servlets.len(),
            self.instances.len(),
            self.users.len(),
            self.configs.len()
        );
        Ok(())
    }

    fn clear_memory(&mut self) {
        self.max_app_id = 0;
        self.max_zone_id = 0;
        self.max_servlet_id = 0;
        self.max_instance_id = 0;
        self.max_config_id = 0;
        self.app_ids.clear();
        self.apps.clear();
        self.zones_of_app.clear();
        self.zone_ids.clear();
        self.zones.clear();
        self.servlets_of_zone.clear();
        self.servlet_ids.clear();
        self.servlets.clear();
        self.instances.clear();
        self.instances_of_app.clear();
        self.instances_of_zone.clear();
        self.instances_of_servlet.clear();
        self.users.clear();
        self.configs.clear();
    }

    fn index_app(&mut self, app: AppMeta) {
        self.app_ids.insert(app.app_name.clone(), app.app_id);
        self.zones_of_app.entry(app.app_id).or_default();
        self.apps.insert(app.app_id, app);
    }

    fn index_zone(&mut self, zone: ZoneMeta) {
        self.zone_ids.insert(
            (zone.app_name.clone(), zone.zone_name.clone()),
            zone.zone_id,
        );
        self.zones_of_app
            .entry(zone.app_id)
            .or_default()
            .insert(zone.zone_id);
        self.servlets_of_zone.entry(zone.zone_id).or_default();
        self.zones.insert(zone.zone_id, zone);
    }

    fn index_servlet(&mut self, servlet: ServletMeta) {
        self.servlet_ids.insert(
            (
                servlet.app_name.clone(),
                servlet.zone_name.clone(),
                servlet.servlet_name.clone(),
            ),
            servlet.servlet_id,
        );
        self.servlets_of_zone
            .entry(servlet.zone_id)
            .or_default()
            .insert(servlet.servlet_id);
        self.servlets.insert(servlet.servlet_id, servlet);
    }

    fn index_instance(&mut self, instance: InstanceMeta) {
        let addr = instance.address.clone();
        self.instances_of_app
            .entry(instance.app_name.clone())
            .or_default()
            .insert(addr.clone());
        self.instances_of_zone
            .entry((instance.app_name.clone(), instance.zone_name.clone()))
            .or_default()
            .insert(addr.clone());
        self.instances_of_servlet
            .entry((
                instance.app_name.clone(),
                instance.zone_name.clone(),
                instance.servlet_name.clone(),
            ))
            .or_default()
            .insert(addr.clone());
        self.instances.insert(addr, instance);
    }

    fn unindex_instance(&mut self, instance: &InstanceMeta) {
        let addr = &instance.address;
        if let Some(s) = self.instances_of_app.get_mut(&instance.app_name) {
            s.remove(addr);
        }
        if let Some(s) = self
            .instances_of_zone
            .get_mut(&(instance.app_name.clone(), instance.zone_name.clone()))
        {
            s.remove(addr);
        }
        if let Some(s) = self.instances_of_servlet.get_mut(&(
            instance.app_name.clone(),
            instance.zone_name.clone(),
            instance.servlet_name.clone(),
        )) {
            s.remove(addr);
        }
        self.instances.remove(addr);
    }
}

#[async_trait]
impl GroupStateMachine for RegistrySm {
    type Cmd = RegistryCmd;
    type Resp = RegistryApplied;

    fn group() -> &'static str {
        "registry"
    }

    async fn apply_cmd(&mut self, cmd: &RegistryCmd) -> Result<RegistryApplied> {
        let resp = match cmd {
            RegistryCmd::CreateApp { app_name, quota } => {
                self.create_app(app_name, *quota).await?
            }
            RegistryCmd::DropApp { app_name } => self.drop_app(app_name).await?,
            RegistryCmd::ModifyApp { app_name, quota } => {
                self.modify_app(app_name, *quota).await?
            }
            RegistryCmd::CreateZone { zone } => self.create_zone(zone).await?,
            RegistryCmd::DropZone {
                app_name,
                zone_name,
            } => self.drop_zone(app_name, zone_name).await?,
            RegistryCmd::ModifyZone {
                app_name,
                zone_name,
                quota,
            } => self.modify_zone(app_name, zone_name, *quota).await?,
            RegistryCmd::CreateServlet { servlet } => self.create_servlet(servlet).await?,
            RegistryCmd::DropServlet {
                app_name,
                zone_name,
                servlet_name,
            } => self.drop_servlet(app_name, zone_name, servlet_name).await?,
            RegistryCmd::ModifyServlet {
                app_name,
                zone_name,
                servlet_name,
            } => {
                self.modify_servlet(app_name, zone_name, servlet_name)
                    .await?
            }
            RegistryCmd::AddInstance { instance } => self.add_instance(instance).await?,
            RegistryCmd::UpdateInstance { instance } => self.update_instance(instance).await?,
            RegistryCmd::DropInstance { address } => self.drop_instance(address).await?,
            RegistryCmd::CreateUser { user } => self.create_user(user).await?,
            RegistryCmd::DropUser { username } => self.drop_user(username).await?,
            RegistryCmd::AddPrivilege { change } => self.add_privilege(change).await?,
            RegistryCmd::DropPrivilege { change } => self.drop_privilege(change).await?,
            RegistryCmd::CreateConfig {
                config_name,
                version,
                content,
                config_type,
                time,
            } => {
                self.create_config(config_name, version, content, *config_type, *time)
                    .await?
            }
            RegistryCmd::RemoveConfig {
                config_name,
                version,
                all,
            } => self.remove_config(config_name, version, *all).await?,
        };

        if !resp.errcode.is_success() {
            tracing::warn!("registry apply rejected: {:?}: {}", cmd, resp.errmsg);
        }
        Ok(resp)
    }

    async fn snapshot_export(&self) -> Result<Vec<u8>> {
        let kvs = self.db.export()?;
        let snap = SerializableSnapshot { kvs };
        let data = serde_json::to_vec(&snap)?;
        Ok(data)
    }

    async fn snapshot_import(&mut self, data: &[u8]) -> Result<()> {
        let snap: SerializableSnapshot = serde_json::from_slice(data)?;
        self.db.import(snap.kvs).await?;
        self.load_from_db()
    }
}

// Schema operations: apps, zones, servlets.
impl RegistrySm {
    async fn create_app(&mut self, app_name: &str, quota: i64) -> Result<RegistryApplied> {
        if self.app_ids.contains_key(app_name) {
            return Ok(RegistryApplied::err(
                ErrCode::InputParamError,
                "app already exists",
            ));
        }

        let app_id = self.max_app_id + 1;
        let app = AppMeta {
            app_name: app_name.to_string(),
            app_id,
            quota,
            version: 1,
        };

        self.db
            .put_batch(
                &[
                    (keys::app_key(app_id), serde_json::to_vec(&app)?),
                    (keys::max_app_id_key(), keys::i64_value(app_id)),
                ],
                &[],
            )
            .await?;

        self.max_app_id = app_id;
        self.index_app(app);
        tracing::info!("create app success: {} id={}", app_name, app_id);
        Ok(RegistryApplied::ok())
    }

    async fn drop_app(&mut self, app_name: &str) -> Result<RegistryApplied> {
        let app_id = match self.app_ids.get(app_name) {
            None => {
                return Ok(RegistryApplied::err(
                    ErrCode::InputParamError,
                    "app not exist",
                ));
            }
            Some(id) => *id,
        };

        if !self
            .zones_of_app
            .get(&app_id)
            .map(|s| s.is_empty())
            .unwrap_or(true)
        {
            return Ok(RegistryApplied::err(
                ErrCode::InputParamError,
                "app has zone",
            ));
        }

        self.db.put_batch(&[], &[keys::app_key(app_id)]).await?;

        self.app_ids.remove(app_name);
        self.apps.remove(&app_id);
        self.zones_of_app.remove(&app_id);
        tracing::info!("drop app success: {}", app_name);
        Ok(RegistryApplied::ok())
    }

    async fn modify_app(&mut self, app_name: &str, quota: Option<i64>) -> Result<RegistryApplied> {
        let app_id = match self.app_ids.get(app_name) {
            None => {
                return Ok(RegistryApplied::err(
                    ErrCode::InputParamError,
                    "app not exist",
                ));
            }
            Some(id) => *id,
        };

        let mut app = self.apps[&app_id].clone();
        if let Some(quota) = quota {
            app.quota = quota;
        }
        app.version += 1;

        self.db
            .put_batch(&[(keys::app_key(app_id), serde_json::to_vec(&app)?)], &[])
            .await?;

        self.apps.insert(app_id, app);
        Ok(RegistryApplied::ok())
    }

    async fn create_zone(&mut self, zone: &ZoneMeta) -> Result<RegistryApplied> {
        let app_id = match self.app_ids.get(&zone.app_name) {
            None => {
                return Ok(RegistryApplied::err(
                    ErrCode::InputParamError,
                    "app not exist",
                ));
            }
            Some(id) => *id,
        };

        let name_key = (zone.app_name.clone(), zone.zone_name.clone());
        if self.zone_ids.contains_key(&name_key) {
            return Ok(RegistryApplied::err(
                ErrCode::InputParamError,
                "zone already exists",
            ));
        }

        let zone_id = self.max_zone_id + 1;
        let zone = ZoneMeta {
            app_name: zone.app_name.clone(),
            zone_name: zone.zone_name.clone(),
            app_id,
            zone_id,
            quota: zone.quota,
            version: 1,
        };

        self.db
            .put_batch(
                &[
                    (keys::zone_key(zone_id), serde_json::to_vec(&zone)?),
                    (keys::max_zone_id_key(), keys::i64_value(zone_id)),
                ],
                &[],
            )
            .await?;

        self.max_zone_id = zone_id;
        self.index_zone(zone);
        Ok(RegistryApplied::ok())
    }

    async fn drop_zone(&mut self, app_name: &str, zone_name: &str) -> Result<RegistryApplied> {
        let zone_id = match self
            .zone_ids
            .get(&(app_name.to_string(), zone_name.to_string()))
        {
            None => {
                return Ok(RegistryApplied::err(
                    ErrCode::InputParamError,
                    "zone not exist",
                ));
            }
            Some(id) => *id,
        };

        if !self
            .servlets_of_zone
            .get(&zone_id)
            .map(|s| s.is_empty())
            .unwrap_or(true)
        {
            return Ok(RegistryApplied::err(
                ErrCode::InputParamError,
                "zone has servlet",
            ));
        }

        self.db.put_batch(&[], &[keys::zone_key(zone_id)]).await?;

        let zone = self.zones.remove(&zone_id);
        self.zone_ids
            .remove(&(app_name.to_string(), zone_name.to_string()));
        self.servlets_of_zone.remove(&zone_id);
        if let Some(zone) = zone {
            if let Some(s) = self.zones_of_app.get_mut(&zone.app_id) {
                s.remove(&zone_id);
            }
        }
        Ok(RegistryApplied::ok())
    }

    async fn modify_zone(
        &mut self,
        app_name: &str,
        zone_name: &str,
        quota: Option<i64>,
    ) -> Result<RegistryApplied> {
        let zone_id = match self
            .zone_ids
            .get(&(app_name.to_string(), zone_name.to_string()))
        {
            None => {
                return Ok(RegistryApplied::err(
                    ErrCode::InputParamError,
                    "zone not exist",
                ));
            }
            Some(id) => *id,
        };

        let mut zone = self.zones[&zone_id].clone();
        if let Some(quota) = quota {
            zone.quota = quota;
        }
        zone.version += 1;

        self.db
            .put_batch(&[(keys::zone_key(zone_id), serde_json::to_vec(&zone)?)], &[])
            .await?;

        self.zones.insert(zone_id, zone);
        Ok(RegistryApplied::ok())
    }

    async fn create_servlet(&mut self, servlet: &ServletMeta) -> Result<RegistryApplied> {
        let app_id = match self.app_ids.get(&servlet.app_name) {
            None => {
                return Ok(RegistryApplied::err(
                    ErrCode::InputParamError,
                    "app not exist",
                ));
            }
            Some(id) => *id,
        };
        let zone_id = match self
            .zone_ids
            .get(&(servlet.app_name.clone(), servlet.zone_name.clone()))
        {
            None => {
                return Ok(RegistryApplied::err(
                    ErrCode::InputParamError,
                    "zone not exist",
                ));
            }
            Some(id) => *id,
        };

        let name_key = (
            servlet.app_name.clone(),
            servlet.zone_name.clone(),
            servlet.servlet_name.clone(),
        );
        if self.servlet_ids.contains_key(&name_key) {
            return Ok(RegistryApplied::err(
                ErrCode::InputParamError,
                "servlet already exists",
            ));
        }

        let servlet_id = self.max_servlet_id + 1;
        let servlet = ServletMeta {
            app_name: servlet.app_name.clone(),
            zone_name: servlet.zone_name.clone(),
            servlet_name: servlet.servlet_name.clone(),
            app_id,
            zone_id,
            servlet_id,
            version: 1,
        };

        self.db
            .put_batch(
                &[
                    (keys::servlet_key(servlet_id), serde_json::to_vec(&servlet)?),
                    (keys::max_servlet_id_key(), keys::i64_value(servlet_id)),
                ],
                &[],
            )
            .await?;

        self.max_servlet_id = servlet_id;
        self.index_servlet(servlet);
        Ok(RegistryApplied::ok())
    }

    async fn drop_servlet(
        &mut self,
        app_name: &str,
        zone_name: &str,
        servlet_name: &str,
    ) -> Result<RegistryApplied> {
        let name_key = (
            app_name.to_string(),
            zone_name.to_string(),
            servlet_name.to_string(),
        );
        let servlet_id = match self.servlet_ids.get(&name_key) {
            None => {
                return Ok(RegistryApplied::err(
                    ErrCode::InputParamError,
                    "servlet not exist",
                ));
            }
            Some(id) => *id,
        };

        if !self
            .instances_of_servlet
            .get(&name_key)
            .map(|s| s.is_empty())
            .unwrap_or(true)
        {
            return Ok(RegistryApplied::err(
                ErrCode::InputParamError,
                "servlet has instance",
            ));
        }

        self.db
            .put_batch(&[], &[keys::servlet_key(servlet_id)])
            .await?;

        let servlet = self.servlets.remove(&servlet_id);
        self.servlet_ids.remove(&name_key);
        self.instances_of_servlet.remove(&name_key);
        if let Some(servlet) = servlet {
            if let Some(s) = self.servlets_of_zone.get_mut(&servlet.zone_id) {
                s.remove(&servlet_id);
            }
        }
        Ok(RegistryApplied::ok())
    }

    async fn modify_servlet(
        &mut self,
        app_name: &str,
        zone_name: &str,
        servlet_name: &str,
    ) -> Result<RegistryApplied> {
        let name_key = (
            app_name.to_string(),
            zone_name.to_string(),
            servlet_name.to_string(),
        );
        let servlet_id = match self.servlet_ids.get(&name_key) {
            None => {
                return Ok(RegistryApplied::err(
                    ErrCode::InputParamError,
                    "servlet not exist",
                ));
            }
            Some(id) => *id,
        };

        // The servlet schema carries no mutable payload today; a modify
        // still bumps the version so consumers re-pull.
        let mut servlet = self.servlets[&servlet_id].clone();
        servlet.version += 1;

        self.db
            .put_batch(
                &[(keys::servlet_key(servlet_id), serde_json::to_vec(&servlet)?)],
                &[],
            )
            .await?;

        self.servlets.insert(servlet_id, servlet);
        Ok(RegistryApplied::ok())
    }
}

// Instance operations.
impl RegistrySm {
    async fn add_instance(&mut self, instance: &InstanceMeta) -> Result<RegistryApplied> {
        let name_key = (
            instance.app_name.clone(),
            instance.zone_name.clone(),
            instance.servlet_name.clone(),
        );
        if !self.servlet_ids.contains_key(&name_key) {
            return Ok(RegistryApplied::err(
                ErrCode::InputParamError,
                "servlet not exist",
            ));
        }

        let mut instance = instance.clone();
        let mut puts = vec![];

        match self.instances.get(&instance.address) {
            // Re-registration is an upsert, not an error.
            Some(prev) => {
                instance.instance_id = prev.instance_id;
                instance.version = prev.version + 1;
            }
            None => {
                let instance_id = self.max_instance_id + 1;
                instance.instance_id = instance_id;
                instance.version = 1;
                puts.push((keys::max_instance_id_key(), keys::i64_value(instance_id)));
            }
        }

        puts.push((
            keys::instance_key(&instance.address),
            serde_json::to_vec(&instance)?,
        ));
        self.db.put_batch(&puts, &[]).await?;

        if instance.instance_id > self.max_instance_id {
            self.max_instance_id = instance.instance_id;
        }
        if let Some(prev) = self.instances.get(&instance.address).cloned() {
            self.unindex_instance(&prev);
        }
        self.index_instance(instance);
        Ok(RegistryApplied::ok())
    }

    async fn update_instance(&mut self, update: &InstanceMeta) -> Result<RegistryApplied> {
        let prev = match self.instances.get(&update.address) {
            None => {
                return Ok(RegistryApplied::err(
                    ErrCode::InputParamError,
                    "instance not exist",
                ));
            }
            Some(p) => p.clone(),
        };

        if !update.app_name.is_empty()
            && (update.app_name != prev.app_name
                || update.zone_name != prev.zone_name
                || update.servlet_name != prev.servlet_name)
        {
            return Ok(RegistryApplied::err(
                ErrCode::InputParamError,
                "instance belongs to another servlet",
            ));
        }

        let mut instance = prev.clone();
        if !update.env.is_empty() {
            instance.env = update.env.clone();
        }
        if !update.color.is_empty() {
            instance.color = update.color.clone();
        }
        instance.status = update.status;
        instance.mtime = update.mtime;
        instance.version = prev.version + 1;

        self.db
            .put_batch(
                &[(
                    keys::instance_key(&instance.address),
                    serde_json::to_vec(&instance)?,
                )],
                &[],
            )
            .await?;

        self.instances
            .insert(instance.address.clone(), instance.clone());
        Ok(RegistryApplied::ok())
    }

    async fn drop_instance(&mut self, address: &str) -> Result<RegistryApplied> {
        let prev = match self.instances.get(address) {
            None => {
                return Ok(RegistryApplied::err(
                    ErrCode::InputParamError,
                    "instance not exist",
                ));
            }
            Some(p) => p.clone(),
        };

        self.db
            .put_batch(&[], &[keys::instance_key(address)])
            .await?;

        self.unindex_instance(&prev);
        Ok(RegistryApplied::ok())
    }
}

// User and privilege operations.
impl RegistrySm {
    async fn create_user(&mut self, user: &UserPrivilege) -> Result<RegistryApplied> {
        if self.users.contains_key(&user.username) {
            return Ok(RegistryApplied::err(
                ErrCode::InputParamError,
                "user already exists",
            ));
        }

        let mut user = user.clone();
        user.version = 1;

        self.db
            .put_batch(
                &[(keys::user_key(&user.username), serde_json::to_vec(&user)?)],
                &[],
            )
            .await?;

        self.users.insert(user.username.clone(), user);
        Ok(RegistryApplied::ok())
    }

    async fn drop_user(&mut self, username: &str) -> Result<RegistryApplied> {
        if !self.users.contains_key(username) {
            return Ok(RegistryApplied::err(
                ErrCode::InputParamError,
                "user not exist",
            ));
        }

        self.db.put_batch(&[], &[keys::user_key(username)]).await?;

        self.users.remove(username);
        Ok(RegistryApplied::ok())
    }

    async fn add_privilege(&mut self, change: &PrivilegeChange) -> Result<RegistryApplied> {
        let mut user = match self.users.get(&change.username) {
            None => {
                return Ok(RegistryApplied::err(
                    ErrCode::InputParamError,
                    "user not exist",
                ));
            }
            Some(u) => u.clone(),
        };

        if let Some(ref hash) = change.password {
            user.password_hash = hash.clone();
        }
        for ip in &change.ips {
            if !user.ips.contains(ip) {
                user.ips.push(ip.clone());
            }
        }
        for zp in &change.zone_privileges {
            match user
                .zone_privileges
                .iter_mut()
                .find(|p| p.app_name == zp.app_name && p.zone_name == zp.zone_name)
            {
                Some(p) => p.rw = zp.rw,
                None => user.zone_privileges.push(zp.clone()),
            }
        }
        for sp in &change.servlet_privileges {
            match user.servlet_privileges.iter_mut().find(|p| {
                p.app_name == sp.app_name
                    && p.zone_name == sp.zone_name
                    && p.servlet_name == sp.servlet_name
            }) {
                Some(p) => p.rw = sp.rw,
                None => user.servlet_privileges.push(sp.clone()),
            }
        }
        user.version += 1;

        self.db
            .put_batch(
                &[(keys::user_key(&user.username), serde_json::to_vec(&user)?)],
                &[],
            )
            .await?;

        self.users.insert(user.username.clone(), user);
        Ok(RegistryApplied::ok())
    }

    async fn drop_privilege(&mut self, change: &PrivilegeChange) -> Result<RegistryApplied> {
        let mut user = match self.users.get(&change.username) {
            None => {
                return Ok(RegistryApplied::err(
                    ErrCode::InputParamError,
                    "user not exist",
                ));
            }
            Some(u) => u.clone(),
        };

        user.ips.retain(|ip| !change.ips.contains(ip));
        user.zone_privileges.retain(|p| {
            !change
                .zone_privileges
                .iter()
                .any(|d| d.app_name == p.app_name && d.zone_name == p.zone_name)
        });
        user.servlet_privileges.retain(|p| {
            !change.servlet_privileges.iter().any(|d| {
                d.app_name == p.app_name
                    && d.zone_name == p.zone_name
                    && d.servlet_name == p.servlet_name
            })
        });
        user.version += 1;

        self.db
            .put_batch(
                &[(keys::user_key(&user.username), serde_json::to_vec(&user)?)],
                &[],
            )
            .await?;

        self.users.insert(user.username.clone(), user);
        Ok(RegistryApplied::ok())
    }
}

// Config operations.
impl RegistrySm {
    async fn create_config(
        &mut self,
        config_name: &str,
        version: &Version,
        content: &str,
        config_type: beacon_types::ConfigType,
        time: i64,
    ) -> Result<RegistryApplied> {
        if let Some(versions) = self.configs.get(config_name) {
            if versions.contains_key(version) {
                return Ok(RegistryApplied::err(
                    ErrCode::ConfigExists,
                    "config version already exists",
                ));
            }
        }

        let config_id = self.max_config_id + 1;
        let config = ConfigMeta {
            config_name: config_name.to_string(),
            version: version.clone(),
            content: content.to_string(),
            config_type,
            config_id,
            time,
        };

        self.db
            .put_batch(
                &[
                    (keys::config_key(config_id), serde_json::to_vec(&config)?),
                    (keys::max_config_id_key(), keys::i64_value(config_id)),
                ],
                &[],
            )
            .await?;

        self.max_config_id = config_id;
        self.configs
            .entry(config.config_name.clone())
            .or_default()
            .insert(config.version.clone(), config);
        Ok(RegistryApplied::ok())
    }

    async fn remove_config(
        &mut self,
        config_name: &str,
        version: &Option<Version>,
        all: bool,
    ) -> Result<RegistryApplied> {
        let versions = match self.configs.get(config_name) {
            None => {
                return Ok(RegistryApplied::err(
                    ErrCode::ConfigNotExists,
                    "config not exist",
                ));
            }
            Some(v) => v,
        };

        if all {
            let dels: Vec<_> = versions
                .values()
                .map(|c| keys::config_key(c.config_id))
                .collect();
            self.db.put_batch(&[], &dels).await?;
            self.configs.remove(config_name);
            return Ok(RegistryApplied::ok());
        }

        let version = match version {
            None => {
                return Ok(RegistryApplied::err(
                    ErrCode::InputParamError,
                    "neither version nor all is set",
                ));
            }
            Some(v) => v,
        };

        let config = match versions.get(version) {
            None => {
                return Ok(RegistryApplied::err(
                    ErrCode::ConfigNotExistsVersion,
                    "config version not exist",
                ));
            }
            Some(c) => c.clone(),
        };

        self.db
            .put_batch(&[], &[keys::config_key(config.config_id)])
            .await?;

        let versions = self.configs.get_mut(config_name).unwrap();
        versions.remove(version);
        if versions.is_empty() {
            self.configs.remove(config_name);
        }
        Ok(RegistryApplied::ok())
    }
}

// The read-only query path. Callers hold the machine's read lock; every
// method only touches the in-memory projection.
impl RegistrySm {
    pub fn get_app(&self, app_name: &str) -> Option<AppMeta> {
        let id = self.app_ids.get(app_name)?;
        self.apps.get(id).cloned()
    }

    pub fn list_apps(&self) -> Vec<AppMeta> {
        let mut apps: Vec<_> = self.apps.values().cloned().collect();
        apps.sort_by(|a, b| a.app_name.cmp(&b.app_name));
        apps
    }

    pub fn get_zone(&self, app_name: &str, zone_name: &str) -> Option<ZoneMeta> {
        let id = self
            .zone_ids
            .get(&(app_name.to_string(), zone_name.to_string()))?;
        self.zones.get(id).cloned()
    }

    pub fn list_zones(&self, app_name: Option<&str>) -> Vec<ZoneMeta> {
        let mut zones: Vec<_> = match app_name {
            None => self.zones.values().cloned().collect(),
            Some(app) => self
                .zones
                .values()
                .filter(|z| z.app_name == app)
                .cloned()
                .collect(),
        };
        zones.sort_by(|a, b| (&a.app_name, &a.zone_name).cmp(&(&b.app_name, &b.zone_name)));
        zones
    }

    pub fn get_servlet(
        &self,
        app_name: &str,
        zone_name: &str,
        servlet_name: &str,
    ) -> Option<ServletMeta> {
        let id = self.servlet_ids.get(&(
            app_name.to_string(),
            zone_name.to_string(),
            servlet_name.to_string(),
        ))?;
        self.servlets.get(id).cloned()
    }

    pub fn list_servlets(&self, app_name: Option<&str>, zone_name: Option<&str>) -> Vec<ServletMeta> {
        let mut servlets: Vec<_> = self
            .servlets
            .values()
            .filter(|s| app_name.map(|a| s.app_name == a).unwrap_or(true))
            .filter(|s| zone_name.map(|z| s.zone_name == z).unwrap_or(true))
            .cloned()
            .collect();
        servlets.sort_by(|a, b| {
            (&a.app_name, &a.zone_name, &a.servlet_name).cmp(&(
                &b.app_name,
                &b.zone_name,
                &b.servlet_name,
            ))
        });
        servlets
    }

    pub fn get_instance(&self, address: &str) -> Option<InstanceMeta> {
        self.instances.get(address).cloned()
    }

    /// All instances under a prefix of the hierarchy, ordered by address.
    pub fn flatten_instances(
        &self,
        app_name: Option<&str>,
        zone_name: Option<&str>,
        servlet_name: Option<&str>,
    ) -> Vec<InstanceMeta> {
        let addresses: Vec<&String> = match (app_name, zone_name, servlet_name) {
            (None, _, _) => return self.instances.values().cloned().collect(),
            (Some(a), None, _) => match self.instances_of_app.get(a) {
                None => return vec![],
                Some(s) => s.iter().collect(),
            },
            (Some(a), Some(z), None) => {
                match self.instances_of_zone.get(&(a.to_string(), z.to_string())) {
                    None => return vec![],
                    Some(s) => s.iter().collect(),
                }
            }
            (Some(a), Some(z), Some(sv)) => {
                match self.instances_of_servlet.get(&(
                    a.to_string(),
                    z.to_string(),
                    sv.to_string(),
                )) {
                    None => return vec![],
                    Some(s) => s.iter().collect(),
                }
            }
        };

        addresses
            .into_iter()
            .filter_map(|addr| self.instances.get(addr).cloned())
            .collect()
    }

    pub fn get_user(&self, username: &str) -> Option<UserPrivilege> {
        self.users.get(username).cloned()
    }

    pub fn list_users(&self) -> Vec<UserPrivilege> {
        self.users.values().cloned().collect()
    }

    pub fn get_config(&self, config_name: &str, version: Option<&Version>) -> std::result::Result<ConfigMeta, ErrCode> {
        let versions = match self.configs.get(config_name) {
            None => return Err(ErrCode::ConfigNotExists),
            Some(v) if v.is_empty() => return Err(ErrCode::ConfigNotExists),
            Some(v) => v,
        };

        match version {
            // absent version means the greatest
            None => Ok(versions.iter().next_back().unwrap().1.clone()),
            Some(v) => versions
                .get(v)
                .cloned()
                .ok_or(ErrCode::ConfigNotExistsVersion),
        }
    }

    pub fn list_configs(&self) -> Vec<ConfigMeta> {
        let mut names: Vec<_> = self.configs.keys().cloned().collect();
        names.sort();
        let mut res = vec![];
        for name in names {
            res.extend(self.configs[&name].values().cloned());
        }
        res
    }

    pub fn list_config_versions(&self, config_name: &str) -> std::result::Result<Vec<ConfigMeta>, ErrCode> {
        let versions = self
            .configs
            .get(config_name)
            .ok_or(ErrCode::ConfigNotExists)?;
        Ok(versions.values().cloned().collect())
    }

    /// Liveness-filtered discovery.
    ///
    /// Zone filtering is strict intersection: a request without zones
    /// matches nothing. Env and color filters are set-membership with an
    /// empty set matching everything. Instances whose `mtime` fell out of
    /// the liveness window are invisible.
    pub fn naming(&self, req: &NamingRequest, now_secs: i64, liveness_s: i64) -> NamingResponse {
        let mut resp = NamingResponse::default();

        let app_id = match self.app_ids.get(&req.app_name) {
            None => {
                resp.errcode = ErrCode::InputParamError;
                resp.errmsg = "app not exist".to_string();
                return resp;
            }
            Some(id) => *id,
        };

        let app_zone_ids = match self.zones_of_app.get(&app_id) {
            Some(s) if !s.is_empty() => s,
            _ => {
                resp.errcode = ErrCode::InputParamError;
                resp.errmsg = "app has no zone".to_string();
                return resp;
            }
        };

        let mut query_zone_ids = BTreeSet::new();
        for zone_name in &req.zones {
            if let Some(id) = self
                .zone_ids
                .get(&(req.app_name.clone(), zone_name.clone()))
            {
                if app_zone_ids.contains(id) {
                    query_zone_ids.insert(*id);
                }
            }
        }
        if query_zone_ids.is_empty() {
            resp.errcode = ErrCode::InputParamError;
            resp.errmsg = "zone not exist".to_string();
            return resp;
        }

        let mut servlet_ids = BTreeSet::new();
        for zone_id in &query_zone_ids {
            if let Some(s) = self.servlets_of_zone.get(zone_id) {
                servlet_ids.extend(s.iter().copied());
            }
        }
        if servlet_ids.is_empty() {
            resp.errcode = ErrCode::InputParamError;
            resp.errmsg = "zone has no servlet".to_string();
            return resp;
        }

        let env_set: BTreeSet<&String> = req.envs.iter().collect();
        let color_set: BTreeSet<&String> = req.colors.iter().collect();

        let mut instances = vec![];
        for servlet_id in &servlet_ids {
            let servlet = match self.servlets.get(servlet_id) {
                None => continue,
                Some(s) => s,
            };
            let addrs = match self.instances_of_servlet.get(&(
                servlet.app_name.clone(),
                servlet.zone_name.clone(),
                servlet.servlet_name.clone(),
            )) {
                None => continue,
                Some(a) => a,
            };
            for addr in addrs {
                let instance = match self.instances.get(addr) {
                    None => continue,
                    Some(i) => i,
                };
                if !env_set.is_empty() && !env_set.contains(&instance.env) {
                    continue;
                }
                if !color_set.is_empty() && !color_set.contains(&instance.color) {
                    continue;
                }
                if now_secs - instance.mtime > liveness_s {
                    continue;
                }
                instances.push(instance.clone());
            }
        }
        instances.sort_by(|a, b| a.address.cmp(&b.address));

        resp.errcode = ErrCode::Success;
        resp.errmsg = "success".to_string();
        resp.instances = instances;
        resp
    }
}
