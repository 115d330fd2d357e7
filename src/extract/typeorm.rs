use log::debug;

use crate::extract::js::{
    conditional_depths, find_calls, first_param_name, function_body_after, tokenize, Token,
};
use crate::extract::{
    conditional_sql_warning, dynamic_sql_warning, join_statements, Extraction, ExtractionWarning,
};

/// Lift SQL out of a TypeORM migration class.
///
/// The upward migration is the class method named `up`; its first parameter
/// names the query runner, and every `<runner>.query(<literal>)` inside the
/// body is collected. The `down` method is deliberately not analyzed.
pub fn extract(path: &str, source: &str) -> Extraction {
    let tokens = tokenize(source);
    let mut warnings: Vec<ExtractionWarning> = Vec::new();

    let auto_commit = has_transaction_false(&tokens);

    let Some(up_ix) = find_up_method(&tokens) else {
        dynamic_sql_warning(
            &mut warnings,
            path,
            1,
            1,
            "No up() migration method found: nothing to analyze",
        );
        return Extraction {
            sql: String::new(),
            warnings,
            auto_commit,
        };
    };
    let runner = first_param_name(&tokens, up_ix).unwrap_or_else(|| "queryRunner".to_string());
    let Some(body) = function_body_after(&tokens, up_ix) else {
        dynamic_sql_warning(
            &mut warnings,
            path,
            tokens[up_ix].line,
            tokens[up_ix].col,
            "up() has no analyzable body",
        );
        return Extraction {
            sql: String::new(),
            warnings,
            auto_commit,
        };
    };

    let depths = conditional_depths(&tokens);
    let mut statements: Vec<String> = Vec::new();

    for call in find_calls(&tokens, body) {
        if call.chain != [runner.as_str(), "query"] {
            continue;
        }
        debug!("typeorm query call at {}:{}", call.line, call.col);
        match crate::extract::js::call_args(&tokens, call.open_paren) {
            Some((args, _)) if !args.is_empty() => {
                let arg = &tokens[args[0].clone()];
                match single_literal(arg) {
                    Some(sql) => {
                        if depths[call.open_paren] > 0 {
                            conditional_sql_warning(&mut warnings, path, call.line, call.col);
                        }
                        statements.push(sql);
                    }
                    None => dynamic_sql_warning(
                        &mut warnings,
                        path,
                        call.line,
                        call.col,
                        "Dynamic SQL: cannot statically analyze queryRunner.query() argument",
                    ),
                }
            }
            _ => dynamic_sql_warning(
                &mut warnings,
                path,
                call.line,
                call.col,
                "Dynamic SQL: cannot statically analyze queryRunner.query() argument",
            ),
        }
    }

    Extraction {
        sql: join_statements(&statements),
        warnings,
        auto_commit,
    }
}

/// A lone string literal or interpolation-free template literal.
fn single_literal(tokens: &[Token]) -> Option<String> {
    match tokens {
        [only] => only.literal_value().map(|s| s.to_string()),
        _ => None,
    }
}

/// `up` as a class method: the identifier directly followed by a parameter
/// list, not preceded by `.` (which would be a call).
fn find_up_method(tokens: &[Token]) -> Option<usize> {
    (0..tokens.len()).find(|&ix| {
        tokens[ix].is_ident("up")
            && tokens.get(ix + 1).map(|t| t.is_punct('(')).unwrap_or(false)
            && (ix == 0 || !tokens[ix - 1].is_punct('.'))
    })
}

/// `transaction = false` declared as a class property disables TypeORM's
/// wrapping transaction for this migration.
fn has_transaction_false(tokens: &[Token]) -> bool {
    tokens.windows(3).any(|window| {
        window[0].is_ident("transaction")
            && window[1].is_punct('=')
            && window[2].is_ident("false")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const MIGRATION: &str = r#"
import { MigrationInterface, QueryRunner } from "typeorm";

export class AddStatus1700000000000 implements MigrationInterface {
    public async up(queryRunner: QueryRunner): Promise<void> {
        await queryRunner.query(`ALTER TABLE users ADD COLUMN status varchar(20)`);
        await queryRunner.query('CREATE INDEX CONCURRENTLY idx_status ON users (status)');
    }

    public async down(queryRunner: QueryRunner): Promise<void> {
        await queryRunner.query(`ALTER TABLE users DROP COLUMN status`);
    }
}
"#;

    #[test]
    fn lifts_up_and_ignores_down() {
        let extraction = extract("m.ts", MIGRATION);
        assert!(extraction.sql.contains("ADD COLUMN status"));
        assert!(extraction.sql.contains("CREATE INDEX CONCURRENTLY"));
        assert!(!extraction.sql.contains("DROP COLUMN"));
        assert!(extraction.warnings.is_empty());
        assert!(!extraction.auto_commit);
    }

    #[test]
    fn respects_runner_parameter_name() {
        let source = r#"
export class M implements MigrationInterface {
    async up(qr: QueryRunner) {
        await qr.query('SELECT 1');
        await other.query('SELECT 2');
    }
}
"#;
        let extraction = extract("m.ts", source);
        assert_eq!(extraction.sql, "SELECT 1;");
    }

    #[test]
    fn dynamic_argument_warns() {
        let source = r#"
export class M implements MigrationInterface {
    async up(queryRunner: QueryRunner) {
        const table = 'users';
        await queryRunner.query(`ALTER TABLE ${table} ADD COLUMN x int`);
        await queryRunner.query(buildSql());
    }
}
"#;
        let extraction = extract("m.ts", source);
        assert_eq!(extraction.sql, "");
        assert_eq!(extraction.warnings.len(), 2);
        for warning in &extraction.warnings {
            assert!(warning.message.contains("Dynamic SQL"));
            assert!(warning.line > 1);
        }
    }

    #[test]
    fn conditional_sql_is_included_but_warned() {
        let source = r#"
export class M implements MigrationInterface {
    async up(queryRunner: QueryRunner) {
        if (process.env.BIG) {
            await queryRunner.query('DROP TABLE big_cache');
        }
    }
}
"#;
        let extraction = extract("m.ts", source);
        assert_eq!(extraction.sql, "DROP TABLE big_cache;");
        assert_eq!(extraction.warnings.len(), 1);
        assert!(extraction.warnings[0].message.contains("Conditional SQL"));
    }

    #[test]
    fn transaction_false_sets_auto_commit() {
        let source = r#"
export class M implements MigrationInterface {
    transaction = false;
    async up(queryRunner: QueryRunner) {
        await queryRunner.query('CREATE INDEX CONCURRENTLY i ON t (c)');
    }
}
"#;
        let extraction = extract("m.ts", source);
        assert!(extraction.auto_commit);
    }

    #[test]
    fn missing_up_is_a_warning_not_an_error() {
        let extraction = extract("m.ts", "export class M { async down(q) {} }");
        assert_eq!(extraction.sql, "");
        assert_eq!(extraction.warnings.len(), 1);
        assert!(extraction.warnings[0].message.contains("No up()"));
    }
}
