//! Renderers that turn a [`GeneratedProgram`] into files.

use crate::codegen::{GeneratedProgram, ProgramUnit};

pub fn to_json(program: &GeneratedProgram) -> String {
    serde_json::to_string_pretty(program).unwrap_or_else(|_| "{}".to_string())
}

/// Every unit as `-- unit: name` followed by its body.
pub fn to_sql_script(program: &GeneratedProgram) -> String {
    let mut output = format!("-- context: {}\n", program.context);
    for unit in &program.units {
        output.push('\n');
        output.push_str(&format!("-- unit: {}\n", unit.name));
        if !unit.depends_on.is_empty() {
            output.push_str(&format!("-- depends on: {}\n", unit.depends_on.join(", ")));
        }
        output.push_str(&unit.body);
        output.push_str(";\n");
    }
    output
}

/// `<prefix><context>.py`, with anything but ASCII alphanumerics, `_` and
/// `-` in the context replaced by `_` so the name stays a single path component.
pub fn job_file_name(job_prefix: &str, context: &str) -> String {
    let context: String = context
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect();
    format!("{}{}.py", job_prefix, context)
}

/// Rebinds the literal forms of `FECHA_CORTE` (`'YYYY-MM-DD'` and
/// `YYYYMMDD`) to the cut-off passed at run time.
const BIND_CUTOFF: &str = r#"def _bind_cutoff(sql: str, fecha_corte: str) -> str:
    """Rewrite FECHA_CORTE literals in sql to fecha_corte (YYYY-MM-DD)."""
    if fecha_corte == FECHA_CORTE:
        return sql
    sql = sql.replace("'" + FECHA_CORTE + "'", "'" + fecha_corte + "'")
    return sql.replace(FECHA_CORTE.replace("-", ""), fecha_corte.replace("-", ""))
"#;

/// PySpark job: one function per CTE unit registering a temp view, called
/// in program order by `run(spark)`, which returns the final DataFrame.
/// When the program has a dominant cut-off date, every function also takes
/// `fecha_corte` (defaulting to it); the SQL bodies keep their literals.
pub fn to_pyspark(program: &GeneratedProgram, job_prefix: &str) -> String {
    let job_name = format!("{}{}", job_prefix, program.context);
    let cutoff = program.dominant_cutoff();
    let mut out = String::new();

    out.push_str("# -*- coding: utf-8 -*-\n");
    out.push_str(&format!(
        "\"\"\"{} generated by athena2spark.\"\"\"\n\n",
        job_name.replace('"', "'")
    ));
    if cutoff.is_some() {
        out.push_str("import sys\n\n");
    }
    out.push_str("from pyspark.sql import DataFrame, SparkSession\n\n");
    out.push_str(&format!("JOB_NAME = {}\n", py_str(&job_name)));
    out.push_str(&format!("CONTEXT = {}\n", py_str(&program.context)));
    if let Some(cutoff) = cutoff {
        out.push_str(&format!("FECHA_CORTE = {}\n", py_str(&cutoff.to_string())));
    }
    out.push_str(&format!(
        "SOURCE_TABLES = [{}]\n",
        program
            .tables
            .iter()
            .map(|t| py_str(&t.qualified_name().to_string()))
            .collect::<Vec<_>>()
            .join(", ")
    ));
    if cutoff.is_some() {
        out.push_str("\n\n");
        out.push_str(BIND_CUTOFF);
    }

    let (param, arg) = match cutoff {
        Some(_) => (", fecha_corte: str = FECHA_CORTE", ", fecha_corte"),
        None => ("", ""),
    };
    let sql = |body: &str| match cutoff {
        Some(_) => format!("_bind_cutoff({}, fecha_corte)", py_sql(body)),
        None => py_sql(body),
    };

    let (views, last) = match program.units.split_last() {
        Some((last, views)) => (views, Some(last)),
        None => (&[][..], None),
    };

    for (idx, unit) in views.iter().enumerate() {
        out.push_str("\n\n");
        out.push_str(&format!(
            "def {}(spark: SparkSession{}) -> DataFrame:\n",
            function_name(idx, unit),
            param
        ));
        out.push_str(&docstring(unit));
        out.push_str(&format!("    df = spark.sql({})\n", sql(&unit.body)));
        out.push_str(&format!("    df.createOrReplaceTempView({})\n", py_str(&unit.name)));
        out.push_str("    return df\n");
    }

    out.push_str("\n\n");
    out.push_str(&format!("def run(spark: SparkSession{}) -> DataFrame:\n", param));
    if let Some(last) = last {
        out.push_str(&docstring(last));
    }
    for (idx, unit) in views.iter().enumerate() {
        out.push_str(&format!("    {}(spark{})\n", function_name(idx, unit), arg));
    }
    match last {
        Some(last) => out.push_str(&format!("    return spark.sql({})\n", sql(&last.body))),
        None => out.push_str("    raise ValueError(\"empty program\")\n"),
    }

    out.push_str("\n\n");
    out.push_str("if __name__ == \"__main__\":\n");
    out.push_str("    session = SparkSession.builder.appName(JOB_NAME).enableHiveSupport().getOrCreate()\n");
    match cutoff {
        Some(_) => out.push_str("    run(session, *sys.argv[1:2]).show()\n"),
        None => out.push_str("    run(session).show()\n"),
    }
    out
}

fn function_name(idx: usize, unit: &ProgramUnit) -> String {
    let cleaned: String = unit
        .name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    format!("unit_{:02}_{}", idx + 1, cleaned)
}

fn docstring(unit: &ProgramUnit) -> String {
    let mut lines = vec![format!("Unit {}.", unit.name)];
    if !unit.depends_on.is_empty() {
        lines.push(format!("Depends on: {}.", unit.depends_on.join(", ")));
    }
    if !unit.tables.is_empty() {
        lines.push(format!("Reads: {}.", unit.tables.join(", ")));
    }
    let text = lines.join(" ").replace('\\', "\\\\").replace('"', "'");
    format!("    \"\"\"{}\"\"\"\n", text)
}

/// Python string literal; JSON string syntax is valid Python.
fn py_str(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

/// Raw triple-quoted SQL when the body allows it, else an escaped literal.
fn py_sql(body: &str) -> String {
    if body.contains("\"\"\"") {
        py_str(body)
    } else {
        format!("r\"\"\"\n{}\n\"\"\"", body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::compile;

    fn program() -> GeneratedProgram {
        compile(
            "WITH a AS (SELECT id, fecha_corte FROM s.t WHERE fecha_corte = '2025-11-07'), \
             b AS (SELECT id FROM a) SELECT * FROM b",
            "saldos",
        )
        .unwrap()
    }

    #[test]
    fn test_to_json() {
        let json = to_json(&program());
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["context"], "saldos");
        assert_eq!(value["units"][0]["name"], "a");
        assert_eq!(value["units"][2]["materialization"], true);
        assert_eq!(value["tables"][0]["target_catalog"], "spark_catalog");
        assert_eq!(value["temporal_literals"][0]["date"], "2025-11-07");
    }

    #[test]
    fn test_to_sql_script() {
        let script = to_sql_script(&program());
        assert!(script.starts_with("-- context: saldos\n"));
        assert!(script.contains("-- unit: b\n-- depends on: a\nSELECT id FROM a;\n"));
        assert!(script.ends_with("-- unit: final\n-- depends on: b\nSELECT * FROM b;\n"));
    }

    #[test]
    fn test_to_pyspark() {
        let py = to_pyspark(&program(), "GL_HD_SAS_THR_");
        assert!(py.contains("JOB_NAME = \"GL_HD_SAS_THR_saldos\"\n"));
        assert!(py.contains("FECHA_CORTE = \"2025-11-07\"\n"));
        assert!(py.contains("SOURCE_TABLES = [\"spark_catalog.s.t\"]\n"));
        assert!(py.contains(
            "def unit_01_a(spark: SparkSession, fecha_corte: str = FECHA_CORTE) -> DataFrame:\n"
        ));
        assert!(py.contains("    df.createOrReplaceTempView(\"b\")\n"));
        assert!(py.contains(
            "    unit_01_a(spark, fecha_corte)\n    unit_02_b(spark, fecha_corte)\n    \
             return spark.sql(_bind_cutoff(r\"\"\"\nSELECT * FROM b\n\"\"\", fecha_corte))\n"
        ));
        assert!(py.ends_with("    run(session, *sys.argv[1:2]).show()\n"));
    }

    #[test]
    fn test_to_pyspark_keeps_sql_literal() {
        let py = to_pyspark(&program(), "GL_HD_SAS_THR_");
        assert!(py.contains("def run(spark: SparkSession, fecha_corte: str = FECHA_CORTE) -> DataFrame:\n"));
        assert!(py.contains("def _bind_cutoff(sql: str, fecha_corte: str) -> str:\n"));
        assert!(py.contains("WHERE fecha_corte = '2025-11-07'\n"));
    }

    #[test]
    fn test_to_pyspark_without_cutoff() {
        let program = compile("SELECT id FROM s.t", "ids").unwrap();
        let py = to_pyspark(&program, "JOB_");
        assert!(!py.contains("FECHA_CORTE"));
        assert!(!py.contains("_bind_cutoff"));
        assert!(py.contains("def run(spark: SparkSession) -> DataFrame:\n"));
        assert!(py.ends_with("    run(session).show()\n"));
    }

    #[test]
    fn test_py_sql_falls_back_to_escaped_literal() {
        assert_eq!(py_sql("SELECT '\"\"\"'"), "\"SELECT '\\\"\\\"\\\"'\"");
        assert_eq!(py_sql("SELECT 1"), "r\"\"\"\nSELECT 1\n\"\"\"");
    }

    #[test]
    fn test_job_file_name() {
        assert_eq!(job_file_name("GL_HD_SAS_THR_", "saldos"), "GL_HD_SAS_THR_saldos.py");
        assert_eq!(job_file_name("GL_", "cartera-diaria"), "GL_cartera-diaria.py");
    }

    #[test]
    fn test_job_file_name_stays_in_output_dir() {
        assert_eq!(job_file_name("GL_", "../x"), "GL____x.py");
        assert_eq!(job_file_name("GL_", "a/b\\c"), "GL_a_b_c.py");
        assert_eq!(job_file_name("", ".."), "__.py");
    }
}
