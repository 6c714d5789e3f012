use simple_db::database::Database;
use simple_db::field::Field;
use simple_db::operators::{OpIterator, SeqScan};
use simple_db::row::simple_int_schema;
use simple_db::transaction::Transaction;
use simple_db::tuple::Tuple;

fn fresh_db() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    Database::reset();
    dir
}

/// Insert a batch of tuples in one transaction, commit, then scan them
/// back in a fresh transaction through a `SeqScan` and check every value
/// reappears in page order.
#[test]
fn insert_then_scan_roundtrip_across_transactions() {
    let dir = fresh_db();
    let schema = simple_int_schema(3, "c");
    let path = dir.path().join("t.dat");
    let table_id = Database::mut_catalog()
        .add_table("t", schema, &path, None)
        .unwrap();

    let tx = Transaction::new();
    let file = Database::catalog().get_heap_file(table_id).unwrap();
    let rows = 2_000;
    for i in 0..rows {
        let tuple = Tuple::from_fields(
            file.schema().clone(),
            vec![Field::Int(i), Field::Int(i * 2), Field::Int(i * 3)],
        );
        file.insert_tuple(&tx, tuple).unwrap();
    }
    tx.commit().unwrap();

    assert!(file.num_pages() > 1, "enough rows to span multiple pages");

    let tx2 = Transaction::new();
    let mut scan = SeqScan::new(&tx2, table_id, "t").unwrap();
    scan.open().unwrap();
    let mut seen = 0;
    while scan.has_next().unwrap() {
        let t = scan.next().unwrap();
        let c0 = t.get_field(0).as_int().unwrap();
        assert_eq!(t.get_field(1).as_int().unwrap(), c0 * 2);
        assert_eq!(t.get_field(2).as_int().unwrap(), c0 * 3);
        seen += 1;
    }
    scan.close();
    tx2.commit().unwrap();
    assert_eq!(seen, rows);
}
