//! Tests for entity references and the resolvers
//!
//! These tests verify:
//! - Null and deleted references encode as serial -1 for every kind
//! - Dangling serials decode as absent, never as errors
//! - Tidy vs. untidy collection writes
//! - The `*_list` and `*_list_or_null` read flavors
//! - Concurrent registry access

use std::sync::Arc;
use std::thread;

use worldsave::resolver::{Entity, EntityKind};
use worldsave::{
    BinaryFileReader, BinaryFileWriter, Config, EntityResolver, GenericReader, GenericWriter,
    MemoryResolver, Serial, SerialResolver,
};

// =============================================================================
// Helpers
// =============================================================================

type World = Arc<MemoryResolver>;

/// Registry with items 1..=n, actors 100..100+n and groups 200..200+n
fn setup_world(n: i32) -> World {
    let world = Arc::new(MemoryResolver::new());
    for i in 0..n {
        world.register(EntityKind::Item, Serial::new(1 + i));
        world.register(EntityKind::Actor, Serial::new(100 + i));
        world.register(EntityKind::Group, Serial::new(200 + i));
    }
    world
}

fn save<F>(world: &World, f: F) -> Vec<u8>
where
    F: FnOnce(&mut BinaryFileWriter<Vec<u8>, World>) -> worldsave::Result<()>,
{
    let mut writer = BinaryFileWriter::new(Vec::new(), &Config::default(), Arc::clone(world)).unwrap();
    f(&mut writer).unwrap();
    writer.into_inner().unwrap()
}

fn load(world: &World, bytes: Vec<u8>) -> BinaryFileReader<std::io::Cursor<Vec<u8>>, World> {
    BinaryFileReader::from_bytes(bytes, &Config::default(), Arc::clone(world))
}

fn serials(list: &[Arc<Entity>]) -> Vec<i32> {
    list.iter().map(|e| e.serial().value()).collect()
}

const NULL_SERIAL: [u8; 4] = [0xFF; 4];

// =============================================================================
// Single Reference Tests
// =============================================================================

#[test]
fn test_null_references_encode_as_minus_one() {
    let world = setup_world(0);
    let bytes = save(&world, |w| {
        w.write_item(None)?;
        w.write_actor(None)?;
        w.write_group(None)
    });

    assert_eq!(bytes, [NULL_SERIAL, NULL_SERIAL, NULL_SERIAL].concat());

    let mut reader = load(&world, bytes);
    assert!(reader.read_item().unwrap().is_none());
    assert!(reader.read_actor().unwrap().is_none());
    assert!(reader.read_group().unwrap().is_none());
    assert!(reader.end().unwrap());
}

#[test]
fn test_deleted_references_encode_as_minus_one() {
    let world = setup_world(1);
    let item = world.get(EntityKind::Item, Serial::new(1)).unwrap();
    let actor = world.get(EntityKind::Actor, Serial::new(100)).unwrap();
    let group = world.get(EntityKind::Group, Serial::new(200)).unwrap();

    assert!(world.delete(EntityKind::Item, Serial::new(1)));
    assert!(world.delete(EntityKind::Actor, Serial::new(100)));
    assert!(world.delete(EntityKind::Group, Serial::new(200)));
    assert!(item.is_deleted());

    let bytes = save(&world, |w| {
        w.write_item(Some(&item))?;
        w.write_actor(Some(&actor))?;
        w.write_group(Some(&group))
    });
    assert_eq!(bytes, [NULL_SERIAL, NULL_SERIAL, NULL_SERIAL].concat());
}

#[test]
fn test_live_references_round_trip() {
    let world = setup_world(3);
    let item = world.get(EntityKind::Item, Serial::new(2)).unwrap();
    let actor = world.get(EntityKind::Actor, Serial::new(101)).unwrap();
    let group = world.get(EntityKind::Group, Serial::new(202)).unwrap();

    let bytes = save(&world, |w| {
        w.write_item(Some(&item))?;
        w.write_actor(Some(&actor))?;
        w.write_group(Some(&group))
    });
    assert_eq!(bytes[0..4], 2i32.to_le_bytes());

    let mut reader = load(&world, bytes);
    assert_eq!(reader.read_item().unwrap(), Some(item));
    assert_eq!(reader.read_actor().unwrap(), Some(actor));
    assert_eq!(reader.read_group().unwrap(), Some(group));
}

#[test]
fn test_dangling_reference_reads_as_absent() {
    let world = setup_world(2);
    let item = world.get(EntityKind::Item, Serial::new(1)).unwrap();
    let bytes = save(&world, |w| w.write_item(Some(&item)));
    assert_eq!(bytes, 1i32.to_le_bytes().to_vec());

    // Gone by the time the stream is loaded
    world.delete(EntityKind::Item, Serial::new(1));

    let mut reader = load(&world, bytes);
    assert!(reader.read_item().unwrap().is_none());
    assert!(reader.end().unwrap());
}

#[test]
fn test_kinds_resolve_in_their_own_table() {
    let world = setup_world(1);
    // Serial 1 is an item, not an actor
    let bytes = save(&world, |w| w.write_serial(Serial::new(1)));

    let mut reader = load(&world, bytes);
    assert!(reader.read_actor().unwrap().is_none());
}

// =============================================================================
// Collection Tests
// =============================================================================

#[test]
fn test_tidy_list_drops_deleted_entries() {
    let world = setup_world(5);
    let mut list: Vec<Arc<Entity>> =
        (1..=5).map(|s| world.get(EntityKind::Item, Serial::new(s)).unwrap()).collect();
    world.delete(EntityKind::Item, Serial::new(2));
    world.delete(EntityKind::Item, Serial::new(4));

    let bytes = save(&world, |w| w.write_item_list(&mut list, true));

    // The caller's list was cleaned too
    assert_eq!(serials(&list), vec![1, 3, 5]);
    assert_eq!(bytes.len(), 4 + 3 * 4);
    assert_eq!(bytes[0..4], 3i32.to_le_bytes());

    let mut reader = load(&world, bytes);
    assert_eq!(serials(&reader.read_item_list().unwrap()), vec![1, 3, 5]);
}

#[test]
fn test_untidy_list_keeps_count_and_nulls() {
    let world = setup_world(5);
    let mut list: Vec<Arc<Entity>> =
        (1..=5).map(|s| world.get(EntityKind::Item, Serial::new(s)).unwrap()).collect();
    world.delete(EntityKind::Item, Serial::new(2));
    world.delete(EntityKind::Item, Serial::new(4));

    let bytes = save(&world, |w| w.write_item_list(&mut list, false));

    assert_eq!(list.len(), 5);
    assert_eq!(bytes.len(), 4 + 5 * 4);
    assert_eq!(bytes[0..4], 5i32.to_le_bytes());
    assert_eq!(bytes[8..12], NULL_SERIAL);
    assert_eq!(bytes[16..20], NULL_SERIAL);

    // Entries that no longer resolve are skipped on load
    let mut reader = load(&world, bytes);
    assert_eq!(serials(&reader.read_item_list().unwrap()), vec![1, 3, 5]);
}

#[test]
fn test_list_flavors_on_empty_collection() {
    let world = setup_world(0);
    let bytes = save(&world, |w| {
        w.write_actor_list(&mut Vec::new(), true)?;
        w.write_actor_list(&mut Vec::new(), false)
    });
    assert_eq!(bytes, vec![0; 8]);

    let mut reader = load(&world, bytes);
    assert!(reader.read_actor_list_or_null().unwrap().is_none());
    assert!(reader.read_actor_list().unwrap().is_empty());
}

#[test]
fn test_list_or_null_with_all_entries_gone() {
    let world = setup_world(3);
    let mut list: Vec<Arc<Entity>> =
        (200..203).map(|s| world.get(EntityKind::Group, Serial::new(s)).unwrap()).collect();
    let bytes = save(&world, |w| w.write_group_list(&mut list, true));

    for s in 200..203 {
        world.delete(EntityKind::Group, Serial::new(s));
    }

    // Non-zero count: present, just empty
    let mut reader = load(&world, bytes);
    assert_eq!(reader.read_group_list_or_null().unwrap(), Some(Vec::new()));
}

#[test]
fn test_all_kinds_of_lists_round_trip() {
    let world = setup_world(4);
    let mut items: Vec<Arc<Entity>> =
        (1..=4).map(|s| world.get(EntityKind::Item, Serial::new(s)).unwrap()).collect();
    let mut actors: Vec<Arc<Entity>> =
        (100..104).map(|s| world.get(EntityKind::Actor, Serial::new(s)).unwrap()).collect();
    let mut groups: Vec<Arc<Entity>> =
        (200..204).map(|s| world.get(EntityKind::Group, Serial::new(s)).unwrap()).collect();

    let bytes = save(&world, |w| {
        w.write_item_list(&mut items, true)?;
        w.write_actor_list(&mut actors, true)?;
        w.write_group_list(&mut groups, false)
    });

    let mut reader = load(&world, bytes);
    assert_eq!(reader.read_item_list_or_null().unwrap(), Some(items));
    assert_eq!(reader.read_actor_list().unwrap(), actors);
    assert_eq!(reader.read_group_list().unwrap(), groups);
    assert!(reader.end().unwrap());
}

// =============================================================================
// Resolver Tests
// =============================================================================

#[test]
fn test_serial_resolver_passes_serials_through() {
    let config = Config::default();
    let mut writer = BinaryFileWriter::new(Vec::new(), &config, SerialResolver).unwrap();
    writer.write_item(Some(&Serial::new(77))).unwrap();
    writer.write_actor(None).unwrap();
    writer.write_group_list(&mut vec![Serial::new(5), Serial::MINUS_ONE], true).unwrap();
    let bytes = writer.into_inner().unwrap();

    let mut reader = BinaryFileReader::from_bytes(bytes, &config, SerialResolver);
    assert_eq!(reader.read_item().unwrap(), Some(Serial::new(77)));
    assert_eq!(reader.read_actor().unwrap(), None);
    assert_eq!(reader.read_group_list().unwrap(), vec![Serial::new(5)]);
}

#[test]
fn test_register_replaces_and_delete_reports() {
    let world = MemoryResolver::new();
    assert!(world.is_empty());

    let first = world.register(EntityKind::Actor, Serial::new(9));
    let second = world.register(EntityKind::Actor, Serial::new(9));
    assert_eq!(world.len(EntityKind::Actor), 1);
    assert!(Arc::ptr_eq(&world.find_actor(Serial::new(9)).unwrap(), &second));
    assert!(!first.is_deleted());

    assert!(world.delete(EntityKind::Actor, Serial::new(9)));
    assert!(!world.delete(EntityKind::Actor, Serial::new(9)));
    assert!(world.find_actor(Serial::new(9)).is_none());
    assert_eq!(world.actor_serial(&second), Serial::MINUS_ONE);
}

#[test]
fn test_concurrent_lookups_and_deletes() {
    let world = setup_world(1000);
    let mut handles = vec![];

    for t in 0..4 {
        let world = Arc::clone(&world);
        handles.push(thread::spawn(move || {
            for s in 1..=1000 {
                if s % 4 == t {
                    world.delete(EntityKind::Item, Serial::new(s));
                } else {
                    // May or may not still be there; must not panic
                    let _ = world.find_item(Serial::new(s));
                }
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(world.len(EntityKind::Item), 0);
    assert_eq!(world.len(EntityKind::Actor), 1000);
}
