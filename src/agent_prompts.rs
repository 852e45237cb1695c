//! Agent Prompts - System prompts and prompt builders for the SQL agents
//!
//! The selector, decomposer and refiner each get a fixed system prompt that
//! pins the output format, plus a per-request prompt assembled here.

use crate::execution_loop::error_classifier::SqlErrorClass;
use serde::Serialize;

/// System prompt for the schema selector
pub const SELECTOR_SYSTEM_PROMPT: &str = r#"You analyse database schemas. Given a question, you decide which tables and columns are needed to answer it.

## Rules

1. Only name tables and columns that appear in the provided schema
2. Write every entry as table.column
3. Include the key columns needed to join tables
4. Leave out tables the question does not need
5. Never make up a column name
6. Output plain text, one table.column per line, nothing else"#;

/// System prompt for SQL synthesis
pub const DECOMPOSER_SYSTEM_PROMPT: &str = r#"You write SQLite queries from natural-language questions.

## Rules

1. Output SQL only. No explanations, comments or markdown
2. Use only the columns you are given. Never invent a column name
3. Use SQLite syntax (|| for concatenation, LIMIT rather than TOP)
4. Join tables explicitly on their key columns
5. "highest", "most", "top", "best": ORDER BY ... DESC LIMIT 1
6. "lowest", "least", "worst": ORDER BY ... ASC LIMIT 1
7. "top N": ORDER BY ... DESC LIMIT N
8. Compare text values exactly as they are stored
9. The answer is a single SELECT statement"#;

/// System prompt for SQL repair
pub const REFINER_SYSTEM_PROMPT: &str = r#"You debug SQLite queries. You receive a query that failed and the error it produced, and you return a corrected query.

## Rules

1. Output SQL only. No explanations, comments or markdown
2. Fix the error named in the error message
3. Use SQLite syntax only (|| for concatenation, LIMIT rather than TOP)
4. Use only columns that exist in the schema
5. Keep the intent of the original query
6. For a missing column, pick the correct name from the schema
7. For an ambiguous column, qualify it with a table alias
8. The answer is a single SELECT statement"#;

/// Question-shape to SQL-shape heuristics shown to the decomposer
pub const DOMAIN_HEURISTICS: &str = r#"## SQL Patterns

- "highest/most X" -> ORDER BY X DESC LIMIT 1
- "lowest/least X" -> ORDER BY X ASC LIMIT 1
- "top N by X" -> ORDER BY X DESC LIMIT N
- "average X" -> SELECT AVG(X)
- "total X" -> SELECT SUM(X)
- "how many" -> SELECT COUNT(*)
- "in <place>" -> WHERE <location column> = '<place>'

## Joins

- Join on shared keys: ON T1.key = T2.key
- Only join tables the question actually needs
- Alias tables as T1, T2, T3

## Filters

- A named place, category or status becomes a WHERE clause
- Use =, <, >, or LIKE as appropriate
- Year filters on text dates: date_column LIKE '2023%'"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WorkedExample {
    pub question: &'static str,
    pub sql: &'static str,
}

/// Fixed few-shot library for the decomposer.
pub const WORKED_EXAMPLES: &[WorkedExample] = &[
    WorkedExample {
        question: "Which customer has placed the most orders?",
        sql: "SELECT customer_id FROM orders GROUP BY customer_id ORDER BY COUNT(*) DESC LIMIT 1;",
    },
    WorkedExample {
        question: "What is the most expensive product?",
        sql: "SELECT product_name FROM products ORDER BY price DESC LIMIT 1;",
    },
    WorkedExample {
        question: "How many customers are from California?",
        sql: "SELECT COUNT(*) FROM customers WHERE state = 'CA';",
    },
    WorkedExample {
        question: "What is the total revenue from completed orders?",
        sql: "SELECT SUM(total_amount) FROM orders WHERE status = 'completed';",
    },
    WorkedExample {
        question: "Which product category has the highest average price?",
        sql: "SELECT T2.category_name FROM products T1 JOIN categories T2 ON T1.category_id = T2.category_id GROUP BY T1.category_id ORDER BY AVG(T1.price) DESC LIMIT 1;",
    },
    WorkedExample {
        question: "How many orders were placed in 2023?",
        sql: "SELECT COUNT(*) FROM orders WHERE order_date LIKE '2023%';",
    },
    WorkedExample {
        question: "Which city has the most customers?",
        sql: "SELECT city FROM customers GROUP BY city ORDER BY COUNT(*) DESC LIMIT 1;",
    },
    WorkedExample {
        question: "What is the average order value for pending orders?",
        sql: "SELECT AVG(total_amount) FROM orders WHERE status = 'pending';",
    },
    WorkedExample {
        question: "List the top 3 most ordered products by quantity",
        sql: "SELECT T2.product_name FROM order_items T1 JOIN products T2 ON T1.product_id = T2.product_id GROUP BY T1.product_id ORDER BY SUM(T1.quantity) DESC LIMIT 3;",
    },
    WorkedExample {
        question: "Which customer spent the most money total?",
        sql: "SELECT customer_id FROM orders GROUP BY customer_id ORDER BY SUM(total_amount) DESC LIMIT 1;",
    },
];

/// Prompt for picking the relevant columns out of the full inventory
pub fn build_selector_prompt(question: &str, column_inventory: &str) -> String {
    format!(
        r#"DATABASE COLUMNS (exact names):
{}

QUESTION: "{}"

Pick only the table.column entries needed to answer the question, spelled exactly as listed above.

- Use the question's keywords to find the relevant data
- For comparisons (most, highest) include the column being compared
- Include join keys whenever two tables are involved

One table.column per line. Column list only:"#,
        column_inventory, question
    )
}

/// Prompt for synthesising SQL from the selected columns
pub fn build_decomposer_prompt(question: &str, allowed_columns: &[String]) -> String {
    let examples = WORKED_EXAMPLES
        .iter()
        .enumerate()
        .map(|(i, ex)| format!("Example {}:\nQuestion: \"{}\"\nSQL: {}", i + 1, ex.question, ex.sql))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        r#"AVAILABLE COLUMNS (use only these):
{}

{}

## Examples

{}

NOW ANSWER: "{}"

- Follow the patterns in the examples
- Use the exact column names listed above
- Respond with the SQL query only

SQL QUERY:"#,
        allowed_columns.join("\n"),
        DOMAIN_HEURISTICS,
        examples,
        question
    )
}

/// Prompt for repairing a rejected query
pub fn build_refiner_prompt(
    question: &str,
    schema: &str,
    rejected_sql: &str,
    error: &str,
    error_class: &SqlErrorClass,
) -> String {
    let fixes = match error_class.hint() {
        Some(hint) => format!("SPECIFIC FIX NEEDED:\n- {}", hint),
        None => "COMMON FIXES:".to_string(),
    };

    format!(
        r#"ORIGINAL QUESTION: "{}"

DATABASE SCHEMA:
{}

FAILED SQL QUERY:
{}

ERROR MESSAGE: {}

Rewrite the query so the error goes away.

{}
- Use only columns that exist in the schema above
- Write join conditions as table.column = table.column
- Keep table aliases consistent (T1, T2, T3)
- Make sure WHERE clauses reference the right tables
- Comparative questions still need ORDER BY and LIMIT

CORRECTED SQL QUERY:"#,
        question, schema, rejected_sql, error, fixes
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decomposer_prompt_lists_columns_and_examples() {
        let prompt = build_decomposer_prompt(
            "Which city has the most customers?",
            &["customers.city".to_string(), "customers.customer_id".to_string()],
        );
        assert!(prompt.starts_with("AVAILABLE COLUMNS (use only these):\ncustomers.city\ncustomers.customer_id\n"));
        assert!(prompt.contains("Example 10:"));
        assert!(prompt.contains("ORDER BY X DESC LIMIT 1"));
        assert!(prompt.contains("NOW ANSWER: \"Which city has the most customers?\""));
    }

    #[test]
    fn test_refiner_prompt_hint_depends_on_error_class() {
        let with_hint = build_refiner_prompt(
            "q",
            "orders.total_amount",
            "SELECT total FROM orders",
            "SQL error: no such column: total",
            &SqlErrorClass::UnknownColumn,
        );
        assert!(with_hint.contains("SPECIFIC FIX NEEDED:"));
        assert!(with_hint.contains("SELECT total FROM orders"));

        let generic = build_refiner_prompt("q", "s", "SELECT 1", "boom", &SqlErrorClass::Other);
        assert!(generic.contains("COMMON FIXES:"));
        assert!(!generic.contains("SPECIFIC FIX NEEDED"));
    }

    #[test]
    fn test_worked_examples_are_single_reads() {
        for ex in WORKED_EXAMPLES {
            assert!(ex.sql.starts_with("SELECT"), "{}", ex.question);
            assert_eq!(ex.sql.matches(';').count(), 1);
        }
    }
}
