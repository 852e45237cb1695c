#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use nl2sql::config::PipelineConfig;
use nl2sql::llm::{ModelGateway, ScriptedGateway};
use nl2sql::pipeline::Pipeline;
use rusqlite::Connection;
use tempfile::TempDir;

pub(crate) const MODEL: &str = "codellama:13b";

/// Number of rows in `orders`; above the default row cap on purpose.
pub(crate) const ORDER_COUNT: i64 = 120;

/// Throwaway e-commerce database. Dropping it removes the file.
pub(crate) struct SampleDb {
    _dir: TempDir,
    pub(crate) path: PathBuf,
}

/// Customers, categories, products, orders and order items with fixed data.
///
/// Order `n` belongs to customer `((n - 1) % 8) + 1` and totals `10 + n`, so
/// customer 8 has the highest total spend.
pub(crate) fn sample_db() -> SampleDb {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("sample_ecommerce.db");
    let conn = Connection::open(&path).expect("open sample db");
    conn.execute_batch(
        "CREATE TABLE customers (
             customer_id INTEGER PRIMARY KEY,
             first_name TEXT NOT NULL,
             last_name TEXT NOT NULL,
             email TEXT UNIQUE NOT NULL,
             city TEXT,
             state TEXT,
             registration_date DATE,
             is_active BOOLEAN DEFAULT 1
         );
         CREATE TABLE categories (
             category_id INTEGER PRIMARY KEY,
             category_name TEXT NOT NULL,
             description TEXT
         );
         CREATE TABLE products (
             product_id INTEGER PRIMARY KEY,
             product_name TEXT NOT NULL,
             category_id INTEGER,
             price DECIMAL(10,2) NOT NULL,
             stock_quantity INTEGER DEFAULT 0,
             FOREIGN KEY (category_id) REFERENCES categories(category_id)
         );
         CREATE TABLE orders (
             order_id INTEGER PRIMARY KEY,
             customer_id INTEGER NOT NULL,
             order_date DATE NOT NULL,
             total_amount DECIMAL(10,2) NOT NULL,
             status TEXT DEFAULT 'pending',
             FOREIGN KEY (customer_id) REFERENCES customers(customer_id)
         );
         CREATE TABLE order_items (
             item_id INTEGER PRIMARY KEY,
             order_id INTEGER NOT NULL,
             product_id INTEGER NOT NULL,
             quantity INTEGER NOT NULL,
             unit_price DECIMAL(10,2) NOT NULL,
             FOREIGN KEY (order_id) REFERENCES orders(order_id),
             FOREIGN KEY (product_id) REFERENCES products(product_id)
         );

         INSERT INTO categories VALUES
             (1, 'Electronics', 'Devices and gadgets'),
             (2, 'Clothing', 'Apparel'),
             (3, 'Books', 'Printed matter');
         INSERT INTO products VALUES
             (1, 'Laptop Pro', 1, 1299.99, 50),
             (2, 'Headphones', 1, 199.99, 100),
             (3, 'Jeans', 2, 89.99, 200),
             (4, 'T-Shirt', 2, 24.99, 500),
             (5, 'Rust Book', 3, 49.99, 30);
         INSERT INTO customers VALUES
             (1, 'John', 'Smith', 'john@example.com', 'New York', 'NY', '2023-01-15', 1),
             (2, 'Sarah', 'Johnson', 'sarah@example.com', 'Los Angeles', 'CA', '2023-02-20', 1),
             (3, 'Mike', 'Brown', 'mike@example.com', 'Chicago', 'IL', '2023-03-10', 1),
             (4, 'Emily', 'Davis', 'emily@example.com', 'Houston', 'TX', '2023-04-05', 1),
             (5, 'David', 'Wilson', 'david@example.com', 'Phoenix', 'AZ', '2023-05-12', 1),
             (6, 'Lisa', 'Anderson', 'lisa@example.com', 'Philadelphia', 'PA', '2023-06-18', 0),
             (7, 'James', 'Taylor', 'james@example.com', 'San Antonio', 'TX', '2023-07-22', 1),
             (8, 'Maria', 'Garcia', 'maria@example.com', 'San Diego', 'CA', '2023-08-14', 1);

         WITH RECURSIVE seq(n) AS (SELECT 1 UNION ALL SELECT n + 1 FROM seq WHERE n < 120)
         INSERT INTO orders
             SELECT n,
                    ((n - 1) % 8) + 1,
                    printf('2023-%02d-%02d', (n % 12) + 1, (n % 28) + 1),
                    10 + n,
                    CASE n % 3 WHEN 0 THEN 'pending' ELSE 'completed' END
             FROM seq;

         INSERT INTO order_items (order_id, product_id, quantity, unit_price)
             SELECT order_id, (order_id % 5) + 1, (order_id % 3) + 1, 10.0
             FROM orders;",
    )
    .expect("seed sample db");

    SampleDb { _dir: dir, path }
}

pub(crate) fn scripted(responses: &[&str]) -> Arc<ScriptedGateway> {
    let gateway = ScriptedGateway::new(MODEL);
    for response in responses {
        gateway.push(Ok(response.to_string()));
    }
    Arc::new(gateway)
}

pub(crate) fn pipeline(db: &SampleDb, llm: Arc<ScriptedGateway>, max_refinements: u32) -> Pipeline {
    let mut config = PipelineConfig::new(&db.path);
    config.max_refinement_attempts = max_refinements;
    let llm: Arc<dyn ModelGateway> = llm;
    Pipeline::new(config, llm).expect("pipeline over sample db")
}

/// Writable handle for tests that change the database under a pipeline.
pub(crate) fn writable(db: &SampleDb) -> Connection {
    Connection::open(&db.path).expect("open sample db for writing")
}
