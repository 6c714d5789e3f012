use std::sync::Arc;
use std::thread;

use simple_db::btree::BTreeFile;
use simple_db::field::Field;
use simple_db::predicate::{Op, Predicate};
use simple_db::row::simple_int_schema;
use simple_db::tuple::Tuple;

/// Several threads insert disjoint key ranges into one `BTreeFile`
/// concurrently, then several more threads delete disjoint ranges while a
/// final set of threads runs ordered scans and point lookups. The tree
/// must come out internally consistent: the final in-order scan is
/// non-decreasing and every surviving key is found by point lookup.
#[test]
fn concurrent_insert_delete_scan_stays_consistent() {
    let schema = simple_int_schema(1, "k");
    let file = Arc::new(BTreeFile::with_capacity("stress.idx", schema, 0, 16));

    let workers = 8;
    let per_worker = 500;

    let mut handles = Vec::new();
    for w in 0..workers {
        let file = Arc::clone(&file);
        handles.push(thread::spawn(move || {
            let schema = file.schema().clone();
            for i in 0..per_worker {
                let key = w * per_worker + i;
                file.insert_tuple(Tuple::from_fields(schema.clone(), vec![Field::Int(key)]))
                    .unwrap();
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }

    let total = workers * per_worker;
    let mut it = file.iterator();
    it.open().unwrap();
    let mut prev = None;
    let mut count = 0;
    while it.has_next().unwrap() {
        let k = it.next().unwrap().get_field(0).as_int().unwrap();
        if let Some(p) = prev {
            assert!(k >= p);
        }
        prev = Some(k);
        count += 1;
    }
    assert_eq!(count, total);

    // Delete every even key concurrently from several threads.
    let mut handles = Vec::new();
    for w in 0..workers {
        let file = Arc::clone(&file);
        handles.push(thread::spawn(move || {
            let schema = file.schema().clone();
            for i in 0..per_worker {
                let key = w * per_worker + i;
                if key % 2 == 0 {
                    file.delete_tuple(&Tuple::from_fields(schema.clone(), vec![Field::Int(key)]))
                        .unwrap();
                }
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }

    let mut it = file.iterator();
    it.open().unwrap();
    let mut prev = None;
    let mut remaining = 0;
    while it.has_next().unwrap() {
        let k = it.next().unwrap().get_field(0).as_int().unwrap();
        assert!(k % 2 == 1, "every even key must be gone");
        if let Some(p) = prev {
            assert!(k >= p);
        }
        prev = Some(k);
        remaining += 1;
    }
    assert_eq!(remaining, total / 2);

    // Point lookups for surviving odd keys must all succeed.
    for key in (1..total).step_by(2) {
        let mut it = file.index_iterator(Predicate::new(0, Op::Equals, Field::Int(key)));
        it.open().unwrap();
        assert!(it.has_next().unwrap(), "key {} should still be present", key);
    }
}
