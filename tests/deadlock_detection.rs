use std::thread;
use std::time::Duration;

use simple_db::database::Database;
use simple_db::field::Field;
use simple_db::lock_manager::Permission;
use simple_db::page_id::PageId;
use simple_db::row::simple_int_schema;
use simple_db::transaction::Transaction;
use simple_db::tuple::Tuple;

fn fresh_db() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    Database::reset();
    dir
}

/// Two transactions cross-lock two distinct pages in opposite order:
/// `tx1` holds page 0 X and wants page 1 X, `tx2` holds page 1 X and
/// wants page 0 X. The waits-for graph must close a cycle and the lock
/// manager must abort the requester that would complete it, rather than
/// blocking both threads forever.
#[test]
fn crossed_lock_order_is_detected_and_one_side_aborts() {
    let dir = fresh_db();
    let schema = simple_int_schema(1, "c");
    let path = dir.path().join("t.dat");
    let table_id = Database::mut_catalog()
        .add_table("t", schema, &path, None)
        .unwrap();
    let file = Database::catalog().get_heap_file(table_id).unwrap();

    let setup = Transaction::new();
    for i in 0..400 {
        file.insert_tuple(&setup, Tuple::from_fields(file.schema().clone(), vec![Field::Int(i)]))
            .unwrap();
    }
    setup.commit().unwrap();
    assert!(file.num_pages() >= 2, "need at least two distinct pages");

    let page0 = PageId::heap(table_id, 0);
    let page1 = PageId::heap(table_id, 1);

    let tx1 = Transaction::new();
    let tx2 = Transaction::new();

    Database::buffer_pool()
        .with_heap_page_mut(&tx1, page0, Permission::ReadWrite, |_| Ok(()))
        .unwrap();
    Database::buffer_pool()
        .with_heap_page_mut(&tx2, page1, Permission::ReadWrite, |_| Ok(()))
        .unwrap();

    let waiter = thread::spawn(move || {
        Database::buffer_pool().with_heap_page_mut(&tx2, page0, Permission::ReadWrite, |_| Ok(()))
    });

    thread::sleep(Duration::from_millis(50));
    let tx1_result =
        Database::buffer_pool().with_heap_page_mut(&tx1, page1, Permission::ReadWrite, |_| Ok(()));

    // The lock manager leaves releasing an aborted transaction's own held
    // locks to the caller, not to `acquire` itself. Whichever side comes
    // back `transaction-aborted` must call `abort()` here, or the other
    // side's blocked waiter never gets woken.
    if tx1_result.is_err() {
        tx1.abort().unwrap();
    }

    let tx2_result = waiter.join().unwrap();

    if tx2_result.is_err() {
        tx2.abort().unwrap();
    } else {
        tx2.commit().unwrap();
    }
    if tx1_result.is_ok() {
        tx1.commit().unwrap();
    }

    let one_aborted = tx1_result.is_err() || tx2_result.is_err();
    assert!(one_aborted, "a crossed lock cycle must abort at least one side");
    assert!(
        !(tx1_result.is_err() && tx2_result.is_err()),
        "exactly one side should abort, not both"
    );

    if let Err(e) = &tx1_result {
        assert!(e.is_transaction_aborted());
    }
    if let Err(e) = &tx2_result {
        assert!(e.is_transaction_aborted());
    }
}
