//! Shared fixtures for the integration tests
//!
//! Builds a small accelerator tree: two collections of parameters, a
//! snapshot taken from one of them, and a tag vocabulary to go with it.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use superscore_store::{
    Backend, Collection, DirectoryBackend, Entry, FilestoreBackend, MemoryBackend, Parameter,
    Readback, Setpoint, Snapshot, TagGroup, TagGroups, TagSet,
};
use tempfile::TempDir;

pub const DESTINATION: u32 = 0;
pub const AREA: u32 = 1;

pub const SXR: u32 = 0;
pub const HXR: u32 = 1;
pub const GUNB: u32 = 0;
pub const L0B: u32 = 1;

pub fn tag_groups() -> TagGroups {
    let mut groups = TagGroups::new();
    groups.insert(
        DESTINATION,
        TagGroup::new("Destination", "Which endpoint the beam is directed towards")
            .with_tag(SXR, "SXR")
            .with_tag(HXR, "HXR"),
    );
    groups.insert(
        AREA,
        TagGroup::new("Area", "Machine area the PVs belong to")
            .with_tag(GUNB, "GUNB")
            .with_tag(L0B, "L0B"),
    );
    groups
}

pub fn tags(pairs: &[(u32, Vec<u32>)]) -> TagSet {
    pairs
        .iter()
        .map(|(group, ids)| (*group, ids.iter().copied().collect::<BTreeSet<_>>()))
        .collect::<BTreeMap<_, _>>()
}

/// The accelerator tree, with handles on the records tests look up.
pub struct Fixture {
    pub laser: Parameter,
    pub laser_rbv: Readback,
    pub magnet: Parameter,
    pub gunb: Collection,
    pub laser_sp: Setpoint,
    pub magnet_sp: Setpoint,
    pub snapshot: Snapshot,
    pub l0b_param: Parameter,
    pub l0b: Collection,
}

impl Fixture {
    pub fn new() -> Self {
        let laser_rbv = Readback::new("LASR:GUNB:TEST1:RBV", 5.0);
        let laser = Parameter::new("LASR:GUNB:TEST1")
            .with_description("Laser power")
            .with_readback(laser_rbv.clone());
        let magnet = Parameter::new("MGNT:GUNB:TEST0").with_description("First magnet");

        let mut gunb = Collection::new("GUNB")
            .with_description("Gun area parameters")
            .with_child(laser.clone())
            .with_child(magnet.clone());
        gunb.tags = tags(&[(AREA, vec![GUNB])]);

        let laser_sp = Setpoint::new("LASR:GUNB:TEST1", 5.0)
            .with_readback(Readback::new("LASR:GUNB:TEST1:RBV", 5.0));
        let magnet_sp = Setpoint::new("MGNT:GUNB:TEST0", 1);

        let mut snapshot = Snapshot::new("GUNB snapshot")
            .with_origin(gunb.uuid)
            .with_child(laser_sp.clone())
            .with_child(magnet_sp.clone());
        snapshot.tags = tags(&[(DESTINATION, vec![SXR, HXR]), (AREA, vec![GUNB])]);

        let l0b_param = Parameter::new("LASR:L0B:TEST2");
        let mut l0b = Collection::new("L0B").with_child(l0b_param.clone());
        l0b.tags = tags(&[(DESTINATION, vec![HXR]), (AREA, vec![L0B])]);

        Self {
            laser,
            laser_rbv,
            magnet,
            gunb,
            laser_sp,
            magnet_sp,
            snapshot,
            l0b_param,
            l0b,
        }
    }

    /// Top-level entries in saving order.
    pub fn top_level(&self) -> Vec<Entry> {
        vec![
            self.gunb.clone().into(),
            self.snapshot.clone().into(),
            self.l0b.clone().into(),
        ]
    }

    /// Number of addressable records in the tree.
    pub const RECORD_COUNT: usize = 10;

    pub fn save_into(&self, backend: &dyn Backend) {
        for entry in self.top_level() {
            backend.save_entry(&entry).unwrap();
        }
        backend.set_tags(tag_groups()).unwrap();
    }
}

/// A backend plus the scratch directory backing it.
pub struct Harness {
    pub backend: Box<dyn Backend>,
    _dir: Option<TempDir>,
}

/// One empty instance of every backend.
pub fn all_backends() -> Vec<Harness> {
    let file_dir = TempDir::new().unwrap();
    let filestore = FilestoreBackend::open(file_dir.path().join("filestore.json")).unwrap();

    let tree_dir = TempDir::new().unwrap();
    let directory = DirectoryBackend::open(tree_dir.path().join("db")).unwrap();

    vec![
        Harness {
            backend: Box::new(MemoryBackend::new()),
            _dir: None,
        },
        Harness {
            backend: Box::new(filestore),
            _dir: Some(file_dir),
        },
        Harness {
            backend: Box::new(directory),
            _dir: Some(tree_dir),
        },
    ]
}

/// Every backend, pre-populated with the fixture tree.
pub fn populated_backends() -> Vec<(Harness, Fixture)> {
    all_backends()
        .into_iter()
        .map(|harness| {
            let fixture = Fixture::new();
            fixture.save_into(harness.backend.as_ref());
            (harness, fixture)
        })
        .collect()
}
