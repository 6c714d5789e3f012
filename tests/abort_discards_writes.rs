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

fn scan_values(table_id: i32) -> Vec<i32> {
    let tx = Transaction::new();
    let mut scan = SeqScan::new(&tx, table_id, "t").unwrap();
    scan.open().unwrap();
    let mut values = Vec::new();
    while scan.has_next().unwrap() {
        values.push(scan.next().unwrap().get_field(0).as_int().unwrap());
    }
    scan.close();
    tx.commit().unwrap();
    values
}

/// Writes made by a transaction that aborts must not be visible to a
/// later transaction: NO-STEAL means the dirty pages were never evicted
/// mid-transaction, so discarding them on abort is equivalent to undo.
///
/// The table starts empty, so the doomed transaction's very first insert
/// takes the heap file's extend-on-full path (no existing page has a free
/// slot because there is no existing page at all). That path must still
/// route the tuple through the buffer pool under an X-lock rather than
/// writing it straight to disk, or this abort would leave it durable.
#[test]
fn aborted_transaction_writes_are_not_observed() {
    let dir = fresh_db();
    let schema = simple_int_schema(1, "c");
    let path = dir.path().join("t.dat");
    let table_id = Database::mut_catalog()
        .add_table("t", schema, &path, None)
        .unwrap();
    let file = Database::catalog().get_heap_file(table_id).unwrap();

    assert_eq!(scan_values(table_id).len(), 0);

    let doomed = Transaction::new();
    for i in 0..10 {
        file.insert_tuple(&doomed, Tuple::from_fields(file.schema().clone(), vec![Field::Int(i)]))
            .unwrap();
    }
    // The doomed transaction's own read, mid-transaction, does see its
    // writes (read-your-own-writes within the transaction).
    doomed.abort().unwrap();

    let after = scan_values(table_id);
    assert_eq!(after.len(), 0, "aborted inserts into an empty table must vanish");
}
