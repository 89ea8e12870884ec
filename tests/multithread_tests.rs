use regula::{Regula, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::thread;

#[test]
fn engine_is_shareable_across_threads() {
    let engine = Arc::new(Regula::new());
    let script = "{ set(doubled, [n] * 2) set(big, [n] > 4) }";

    let mut handles = vec![];
    for i in 0..8 {
        let engine = Arc::clone(&engine);
        let handle = thread::spawn(move || {
            for round in 0..50i64 {
                let n = i64::from(i) + round % 3;
                let mut inputs = HashMap::new();
                inputs.insert("n".to_string(), Value::from(n));
                let result = engine.execute(script, &inputs);
                assert!(!result.has_error(), "{:?}", result.error);
                assert_eq!(result.assignment("doubled"), Some(&Value::from(n * 2)));
                assert_eq!(result.assignment("big"), Some(&Value::from(n > 4)));
            }
        });
        handles.push(handle);
    }
    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn concurrent_compilation_of_the_same_script() {
    let engine = Arc::new(Regula::new());
    // All threads race to insert the same cache entry; every execution
    // must still observe a fully constructed block.
    let script = "{ set(a, 1 + 2 + 3) }";

    let mut handles = vec![];
    for _ in 0..8 {
        let engine = Arc::clone(&engine);
        handles.push(thread::spawn(move || {
            for _ in 0..100 {
                let result = engine.execute(script, &HashMap::new());
                assert!(!result.has_error());
                assert_eq!(result.assignment("a"), Some(&Value::from(6)));
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn compiled_block_is_send_and_sync() {
    let engine = Arc::new(Regula::new());
    let block = engine.compile("{ set(a, [n] + 1) }").unwrap();

    let mut handles = vec![];
    for i in 0..4 {
        let engine = Arc::clone(&engine);
        let block = Arc::clone(&block);
        handles.push(thread::spawn(move || {
            let mut inputs = HashMap::new();
            inputs.insert("n".to_string(), Value::from(i));
            let result = engine.execute_block(&block, &inputs);
            assert!(!result.has_error());
            assert_eq!(result.assignment("a"), Some(&Value::from(i + 1)));
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }
}
