//! End-to-end tests through the public `compile` API.

use athena2spark::config::{Config, ForwardReferences, TableFormat};
use athena2spark::error::{render_excerpt, CompileError, ExtractErrorKind};
use athena2spark::{compile, Compiler, ErrorKind, GeneratedProgram};

const SALDOS: &str = "\
WITH tiempo AS (
    SELECT fecha, semana_anio, nombre_dia
    FROM dwh_thr_modelo_datos.dim_tiempo
    WHERE fecha BETWEEN date_add('day', -28, DATE '2025-11-07') AND DATE '2025-11-07'
),
saldos AS (
    SELECT s.cuenta_id, s.fecha_corte, CAST(s.saldo AS DECIMAL(18,2)) AS saldo
    FROM stg_cap.stg_segmentacion_saldos_trad s
    WHERE s.fecha_corte <= 20251107
    UNION ALL
    SELECT p.cuenta_id, p.fecha_corte, CAST(p.saldo AS DECIMAL(18,2)) AS saldo
    FROM stg_cap.stg_segmentacion_saldos_pib p
    WHERE p.fecha_corte <= 20251107
),
semanal AS (
    SELECT
        t.semana_anio,
        'S' || CAST(row_number() OVER (PARTITION BY sd.cuenta_id ORDER BY t.fecha DESC) AS VARCHAR) AS semana,
        sd.cuenta_id,
        SUM(sd.saldo) AS saldo_total
    FROM saldos sd
    JOIN tiempo t ON CAST(date_format(t.fecha, '%Y%m%d') AS INTEGER) = sd.fecha_corte
    WHERE t.nombre_dia IN ('Miércoles', 'miercoles')
    GROUP BY t.semana_anio, sd.cuenta_id, t.fecha
)
SELECT cuenta_id, semana, saldo_total
FROM semanal
WHERE saldo_total > (SELECT AVG(saldo) FROM saldos LIMIT 1)
ORDER BY cuenta_id";

fn iceberg_config() -> Config {
    let mut config = Config::default();
    for table in [
        "dwh_thr_modelo_datos.dim_tiempo",
        "dwh_thr_reportes.fct_saldos_semanal_detallado",
        "stg_cap.stg_segmentacion_saldos_trad",
        "stg_cap.stg_segmentacion_saldos_pib",
    ] {
        config.catalog.tables.insert(table.to_string(), TableFormat::Iceberg);
    }
    config
}

fn assert_dependencies_precede(program: &GeneratedProgram) {
    for (pos, unit) in program.units.iter().enumerate() {
        for dep in &unit.depends_on {
            let dep_pos = program
                .units
                .iter()
                .position(|u| &u.name == dep)
                .unwrap_or_else(|| panic!("{} depends on unknown unit {}", unit.name, dep));
            assert!(dep_pos < pos, "{} appears before its dependency {}", unit.name, dep);
        }
    }
}

#[test]
fn test_concrete_scenario_with_default_schema() {
    let mut config = Config::default();
    config.extract.default_schema = Some("default".into());
    let program = Compiler::new(&config)
        .compile(
            "WITH a AS (SELECT id FROM t WHERE d < 20251107), b AS (SELECT id FROM a) SELECT * FROM b",
            "ctx",
        )
        .unwrap();

    assert_eq!(program.unit_names(), vec!["a", "b", "final"]);
    assert_eq!(program.units[0].depends_on, Vec::<String>::new());
    assert_eq!(program.units[1].depends_on, vec!["a"]);
    assert_eq!(program.units[2].depends_on, vec!["b"]);
    assert_eq!(
        program.units[0].body,
        "SELECT id FROM spark_catalog.default.t WHERE d < 20251107"
    );
    assert_dependencies_precede(&program);
}

#[test]
fn test_bare_table_unresolved_by_default() {
    let err = compile(
        "WITH a AS (SELECT id FROM t WHERE d < 20251107), b AS (SELECT id FROM a) SELECT * FROM b",
        "ctx",
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnresolvedReference);
    assert_eq!(err.snippet(), "t");
}

#[test]
fn test_undefined_cte_is_unresolved() {
    let err = compile(
        "WITH a AS (SELECT id FROM s.t), b AS (SELECT id FROM c) SELECT * FROM b",
        "ctx",
    )
    .unwrap_err();
    match err {
        CompileError::Extract(e) => match e.kind {
            ExtractErrorKind::UnresolvedReference { name } => assert_eq!(name, "c"),
            _ => panic!("Expected UnresolvedReference"),
        },
        _ => panic!("Expected an extract error"),
    }
}

#[test]
fn test_forward_reference_is_cyclic() {
    let err = compile(
        "WITH a AS (SELECT id FROM s.t), b AS (SELECT id FROM c), c AS (SELECT id FROM a) \
         SELECT * FROM b",
        "ctx",
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CyclicDependency);
    assert_eq!(err.span().start.line, 1);
}

#[test]
fn test_true_cycle_reports_path() {
    let mut config = Config::default();
    config.extract.forward_references = ForwardReferences::Reorder;
    let err = Compiler::new(&config)
        .compile(
            "WITH b AS (SELECT id FROM c), c AS (SELECT id FROM b) SELECT * FROM b",
            "ctx",
        )
        .unwrap_err();
    match err {
        CompileError::Extract(e) => match e.kind {
            ExtractErrorKind::CyclicDependency { cycle_path } => {
                assert_eq!(cycle_path, vec!["b", "c", "b"]);
            }
            _ => panic!("Expected CyclicDependency"),
        },
        _ => panic!("Expected an extract error"),
    }
}

#[test]
fn test_backward_references_are_acyclic() {
    let program = compile(
        "WITH a AS (SELECT 1 AS x), b AS (SELECT x FROM a), c AS (SELECT a.x FROM a JOIN b ON a.x = b.x), \
         d AS (SELECT x FROM c UNION ALL SELECT x FROM b) SELECT * FROM d",
        "ctx",
    )
    .unwrap();
    assert_eq!(program.unit_names(), vec!["a", "b", "c", "d", "final"]);
    assert_dependencies_precede(&program);
}

#[test]
fn test_ordering_follows_dependencies_not_source_order() {
    let mut config = Config::default();
    config.extract.forward_references = ForwardReferences::Reorder;
    let compiler = Compiler::new(&config);

    for sql in [
        "WITH a AS (SELECT 1 AS x), b AS (SELECT x FROM a), c AS (SELECT a.x FROM a, b) SELECT * FROM c",
        "WITH a AS (SELECT 1 AS x), c AS (SELECT a.x FROM a, b), b AS (SELECT x FROM a) SELECT * FROM c",
        "WITH c AS (SELECT a.x FROM a, b), b AS (SELECT x FROM a), a AS (SELECT 1 AS x) SELECT * FROM c",
    ] {
        let program = compiler.compile(sql, "ctx").unwrap();
        assert_eq!(program.unit_names(), vec!["a", "b", "c", "final"], "{}", sql);
    }
}

#[test]
fn test_compile_is_deterministic() {
    let compiler = Compiler::new(&iceberg_config());
    let first = compiler.compile(SALDOS, "saldos_semanal").unwrap();
    let second = compiler.compile(SALDOS, "saldos_semanal").unwrap();
    assert_eq!(first, second);
    assert_eq!(
        athena2spark::render::to_json(&first),
        athena2spark::render::to_json(&second)
    );
}

#[test]
fn test_realistic_query() {
    let program = Compiler::new(&iceberg_config())
        .compile(SALDOS, "saldos_semanal")
        .unwrap();

    assert_eq!(program.unit_names(), vec!["tiempo", "saldos", "semanal", "final"]);
    assert_dependencies_precede(&program);

    let tiempo = program.unit("tiempo").unwrap();
    assert_eq!(tiempo.tables, vec!["glue_catalog.dwh_thr_modelo_datos.dim_tiempo"]);
    assert!(tiempo
        .body
        .contains("BETWEEN DATE '2025-11-07' + MAKE_INTERVAL(0, 0, 0, -28, 0, 0, 0) AND DATE '2025-11-07'"));

    let saldos = program.unit("saldos").unwrap();
    assert_eq!(saldos.tables.len(), 2);
    assert!(saldos.body.contains("CAST(s.saldo AS DECIMAL(18,2))"));

    let semanal = program.unit("semanal").unwrap();
    assert_eq!(semanal.depends_on, vec!["tiempo", "saldos"]);
    assert!(semanal.body.contains(
        "'S' || CAST(ROW_NUMBER() OVER (PARTITION BY sd.cuenta_id ORDER BY t.fecha DESC NULLS LAST) AS STRING)"
    ));
    assert!(semanal
        .body
        .contains("CAST(DATE_FORMAT(t.fecha, 'yyyyMMdd') AS INT) = sd.fecha_corte"));
    assert!(semanal.body.contains("IN ('Miércoles', 'miercoles')"));

    let last = program.final_unit().unwrap();
    assert!(last.materialization);
    assert_eq!(last.depends_on, vec!["saldos", "semanal"]);
    assert!(last.body.ends_with("ORDER BY cuenta_id NULLS LAST"));

    assert_eq!(program.tables.len(), 3);
    assert_eq!(
        program.dominant_cutoff(),
        chrono::NaiveDate::from_ymd_opt(2025, 11, 7)
    );
}

#[test]
fn test_literal_aliases_are_opt_in() {
    let mut config = iceberg_config();
    config
        .rules
        .literal_aliases
        .insert("miercoles".into(), "MIERCOLES".into());
    let program = Compiler::new(&config).compile(SALDOS, "ctx").unwrap();
    assert!(program
        .unit("semanal")
        .unwrap()
        .body
        .contains("IN ('MIERCOLES', 'MIERCOLES')"));
}

#[test]
fn test_unknown_function_rejected_with_span() {
    let sql = "SELECT id,\n       xxhash64(cuenta_id) AS h\nFROM s.t";
    let err = compile(sql, "ctx").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoRuleForConstruct);
    match &err {
        CompileError::Rewrite(e) => assert_eq!(e.name(), "XXHASH64"),
        _ => panic!("Expected a rewrite error"),
    }
    assert_eq!(err.span().start.line, 2);
    assert_eq!(err.span().start.column, 8);
    assert_eq!(err.snippet(), "xxhash64(cuenta_id)");
    assert_eq!(
        render_excerpt(sql, err.span()),
        "2 |        xxhash64(cuenta_id) AS h\n           ^^^^^^^^^^^^^^^^^^^"
    );
}

#[test]
fn test_unsupported_syntax_rejected() {
    for sql in [
        "INSERT INTO s.t VALUES (1)",
        "WITH RECURSIVE a AS (SELECT 1) SELECT * FROM a",
        "SELECT * FROM s.t CROSS JOIN UNNEST(arr) AS u(x)",
    ] {
        let err = compile(sql, "ctx").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedSyntax, "{}", sql);
    }
}

#[test]
fn test_compiling_generated_output_again_is_stable() {
    let mut config = Config::default();
    config.extract.default_schema = Some("default".into());
    let compiler = Compiler::new(&config);
    let sql = "WITH a AS (SELECT CAST(id AS VARCHAR) AS id, COUNT(*) AS n FROM s.t GROUP BY id) \
               SELECT id, COALESCE(n, 0) AS n FROM a";
    let first = compiler.compile(sql, "ctx").unwrap();

    let regenerated = format!(
        "WITH a AS ({}) {}",
        first.units[0].body, first.units[1].body
    );
    let second = compiler.compile(&regenerated, "ctx").unwrap();
    assert_eq!(first.units[0].body, second.units[0].body);
    assert_eq!(first.units[1].body, second.units[1].body);
}

#[test]
fn test_program_carries_context() {
    let program = compile("SELECT 1 AS x", "cartera_diaria").unwrap();
    assert_eq!(program.context, "cartera_diaria");
    assert_eq!(program.units.len(), 1);
    assert_eq!(program.units[0].context, "cartera_diaria");
    assert!(program.units[0].materialization);
}
