// End-to-end runs of the normalize → resolve → load pipeline

use finance_etl::{
    count_accounts, count_categories, count_dangling_references, count_transactions,
    get_all_transactions, load_accounts, load_categories, open_database, open_in_memory,
    CsvExtractor, Pipeline, PipelineConfig, PipelineError, PipelineStage, RawBatch,
    TransactionKind,
};
use rusqlite::Connection;
use std::io::Write;

fn statement() -> RawBatch {
    RawBatch::from_rows(
        &["date", "description", "amount", "category"],
        &[
            &["01/03/2024 10:00", " Market ", "-50.00", "Food"],
            &["02/03/2024", "Salary", "3000", "Income"],
        ],
    )
}

fn run(conn: &mut Connection, batch: &RawBatch) -> Result<finance_etl::RunReport, PipelineError> {
    let mut pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
    pipeline.run(conn, batch)
}

/// Raises inside the INSERT when a fact carries this description
fn install_failing_trigger(conn: &Connection, description: &str) {
    conn.execute_batch(&format!(
        "CREATE TRIGGER fail_fact BEFORE INSERT ON transactions
         WHEN NEW.description = '{}'
         BEGIN SELECT RAISE(ABORT, 'rejected by test trigger'); END;",
        description
    ))
    .unwrap();
}

#[test]
fn test_end_to_end_example() {
    let mut conn = open_in_memory().unwrap();

    let report = run(&mut conn, &statement()).unwrap();

    assert_eq!(report.processed, 2);
    assert_eq!(report.skipped, 0);
    assert_eq!(report.loaded, 2);

    let txs = get_all_transactions(&conn).unwrap();
    assert_eq!(txs.len(), 2);
    assert_eq!(txs[0].amount, 50.0);
    assert_eq!(txs[0].kind, TransactionKind::Outflow);
    assert_eq!(txs[0].description, "market");
    assert_eq!(txs[1].amount, 3000.0);
    assert_eq!(txs[1].kind, TransactionKind::Inflow);

    let accounts = load_accounts(&conn).unwrap();
    assert_eq!(accounts.len(), 1);
    assert_eq!(accounts[0].name, "Main");

    let names: Vec<String> = load_categories(&conn)
        .unwrap()
        .into_iter()
        .map(|c| c.name)
        .collect();
    assert_eq!(names, vec!["food", "income"]);
}

#[test]
fn test_rerun_keeps_dimension_cardinality() {
    let mut conn = open_in_memory().unwrap();

    run(&mut conn, &statement()).unwrap();
    let accounts_once = count_accounts(&conn).unwrap();
    let categories_once = count_categories(&conn).unwrap();

    let second = run(&mut conn, &statement()).unwrap();

    assert_eq!(count_accounts(&conn).unwrap(), accounts_once);
    assert_eq!(count_categories(&conn).unwrap(), categories_once);
    assert_eq!(second.accounts_created, 0);
    assert_eq!(second.categories_created, 0);

    // Facts have no natural key, so a second run appends them again
    assert_eq!(count_transactions(&conn).unwrap(), 4);
}

#[test]
fn test_sign_and_reference_invariants() {
    let mut conn = open_in_memory().unwrap();
    let batch = RawBatch::from_rows(
        &["Date", "Amount", "Category", "Account"],
        &[
            &["01/03/2024", "-10.25", "Food", "Card"],
            &["02/03/2024", "(4.00)", "Fees", "Card"],
            &["03/03/2024", "0", "Misc", ""],
            &["04/03/2024", "1.234,50", "Income", "Checking"],
        ],
    );
    let expected = [
        (10.25, TransactionKind::Outflow),
        (4.0, TransactionKind::Outflow),
        (0.0, TransactionKind::Inflow),
        (1234.5, TransactionKind::Inflow),
    ];

    run(&mut conn, &batch).unwrap();

    let txs = get_all_transactions(&conn).unwrap();
    assert_eq!(txs.len(), expected.len());
    for (tx, (amount, kind)) in txs.iter().zip(expected.iter()) {
        assert!(tx.amount >= 0.0);
        assert_eq!(tx.amount, *amount);
        assert_eq!(tx.kind, *kind);
    }
    assert_eq!(count_dangling_references(&conn).unwrap(), 0);

    let accounts: Vec<String> = load_accounts(&conn).unwrap().into_iter().map(|a| a.name).collect();
    assert_eq!(accounts, vec!["Card", "Main", "Checking"]);
}

#[test]
fn test_invalid_rows_are_skipped_and_counted() {
    let mut conn = open_in_memory().unwrap();
    let batch = RawBatch::from_rows(
        &["date", "description", "amount", "category"],
        &[
            &["31/31/2024", "bad date", "1", "food"],
            &["01/03/2024", "bad amount", "one", "food"],
            &["01/03/2024", "no category", "1", ""],
            &["01/03/2024", "fine", "1", "food"],
        ],
    );

    let report = run(&mut conn, &batch).unwrap();

    assert_eq!(report.processed, 4);
    assert_eq!(report.skipped, 3);
    assert_eq!(report.loaded, 1);
    let txs = get_all_transactions(&conn).unwrap();
    assert_eq!(txs.len(), 1);
    assert_eq!(txs[0].description, "fine");
}

#[test]
fn test_constraint_failure_rolls_back_whole_run() {
    let mut conn = open_in_memory().unwrap();
    run(&mut conn, &statement()).unwrap();
    install_failing_trigger(&conn, "boom");

    let batch = RawBatch::from_rows(
        &["date", "description", "amount", "category", "account"],
        &[
            &["05/03/2024", "ok", "-5", "Transport", "Savings"],
            &["06/03/2024", "Boom", "-7", "Transport", "Savings"],
        ],
    );
    let config = PipelineConfig::default().with_chunk_size(1);
    let mut pipeline = Pipeline::new(config).unwrap();

    let result = pipeline.run(&mut conn, &batch);

    assert!(matches!(result, Err(PipelineError::Transaction(_))));
    assert_eq!(pipeline.stage(), PipelineStage::Aborted);
    // Neither the first chunk's fact nor the new dimension rows survive
    assert_eq!(count_transactions(&conn).unwrap(), 2);
    assert_eq!(count_accounts(&conn).unwrap(), 1);
    assert_eq!(count_categories(&conn).unwrap(), 2);
}

#[test]
fn test_chunk_size_does_not_change_result() {
    let rows: Vec<Vec<String>> = (0..25)
        .map(|i| {
            vec![
                format!("{:02}/03/2024", i % 28 + 1),
                format!("item {}", i),
                format!("-{}.00", i + 1),
                format!("cat{}", i % 4),
            ]
        })
        .collect();
    let batch = RawBatch::new(
        vec!["date".into(), "description".into(), "amount".into(), "category".into()],
        rows,
    );

    let mut small = open_in_memory().unwrap();
    let mut large = open_in_memory().unwrap();
    Pipeline::new(PipelineConfig::default().with_chunk_size(4))
        .unwrap()
        .run(&mut small, &batch)
        .unwrap();
    Pipeline::new(PipelineConfig::default().with_chunk_size(1000))
        .unwrap()
        .run(&mut large, &batch)
        .unwrap();

    assert_eq!(
        get_all_transactions(&small).unwrap(),
        get_all_transactions(&large).unwrap()
    );
    assert_eq!(count_transactions(&small).unwrap(), 25);
}

#[test]
fn test_csv_file_into_file_database() {
    let dir = tempfile::tempdir().unwrap();
    let csv_path = dir.path().join("extrato.csv");
    let db_path = dir.path().join("finance.db");

    let mut file = std::fs::File::create(&csv_path).unwrap();
    writeln!(file, "Data;Descrição;Valor;Categoria;Conta;Unnamed: 5").unwrap();
    writeln!(file, "01/03/2024 10:00; Mercado ;-50,00;Alimentação;;x").unwrap();
    writeln!(file, "02/03/2024;Salário;3.000,00;Salário;Nubank;y").unwrap();
    drop(file);

    let config = PipelineConfig::default().with_delimiter(';');
    let extractor = CsvExtractor::new(&csv_path).with_delimiter(config.delimiter);
    let mut conn = open_database(&db_path).unwrap();

    let report = Pipeline::new(config)
        .unwrap()
        .run(&mut conn, &extractor)
        .unwrap();
    drop(conn);

    assert_eq!(report.loaded, 2);

    let conn = open_database(&db_path).unwrap();
    let txs = get_all_transactions(&conn).unwrap();
    assert_eq!(txs[0].description, "mercado");
    assert_eq!(txs[0].amount, 50.0);
    assert_eq!(txs[1].amount, 3000.0);

    let accounts: Vec<String> = load_accounts(&conn).unwrap().into_iter().map(|a| a.name).collect();
    assert_eq!(accounts, vec!["Main", "Nubank"]);
    let categories: Vec<String> = load_categories(&conn).unwrap().into_iter().map(|c| c.name).collect();
    assert_eq!(categories, vec!["alimentação", "salário"]);
}

/// Rows for one writer: three shared accounts, seven shared categories
fn overlapping_batch(writer: usize, rows: usize) -> RawBatch {
    let accounts = ["Checking", "Savings", "Card"];
    let headers = ["date", "description", "amount", "category", "account"]
        .iter()
        .map(|h| h.to_string())
        .collect();

    let rows = (0..rows)
        .map(|i| {
            vec![
                format!("{:02}/03/2024", i % 28 + 1),
                format!("writer {} row {}", writer, i),
                if i % 2 == 0 { "-10.50".to_string() } else { "20".to_string() },
                format!("cat{}", (i * 3 + writer) % 7),
                accounts[(i + writer) % 3].to_string(),
            ]
        })
        .collect();

    RawBatch::new(headers, rows)
}

#[test]
fn test_concurrent_runs_share_dimensions() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("shared.db");
    drop(open_database(&db_path).unwrap());

    let writers = 8;
    let results: Vec<Result<usize, String>> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..writers)
            .map(|writer| {
                let db_path = &db_path;
                scope.spawn(move || {
                    let mut conn = open_database(db_path).map_err(|e| e.to_string())?;
                    let config = PipelineConfig::default().with_chunk_size(7);
                    Pipeline::new(config)
                        .map_err(|e| e.to_string())?
                        .run(&mut conn, &overlapping_batch(writer, 50))
                        .map(|report| report.loaded)
                        .map_err(|e| e.to_string())
                })
            })
            .collect();

        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(results, vec![Ok(50); writers]);

    let conn = open_database(&db_path).unwrap();
    assert_eq!(count_accounts(&conn).unwrap(), 3);
    assert_eq!(count_categories(&conn).unwrap(), 7);
    assert_eq!(count_transactions(&conn).unwrap(), 400);
    assert_eq!(count_dangling_references(&conn).unwrap(), 0);
}
