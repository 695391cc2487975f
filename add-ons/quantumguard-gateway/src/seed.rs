//! Demo seed data for the dashboard (`quantumguard-gateway --seed`).
//!
//! Users are upserted by email so reseeding is idempotent; the log tables are
//! append-only by design, so anomalies / query logs / encryption logs are only
//! seeded into an empty store.

use crate::store::DashboardSqlite;

pub fn seed_demo_data(store: &DashboardSqlite) -> Result<(), rusqlite::Error> {
    let users = [
        ("admin@quantumguard.com", "Admin User", "admin"),
        ("analyst@quantumguard.com", "Security Analyst", "analyst"),
        ("scientist@quantumguard.com", "Data Scientist", "scientist"),
        ("viewer@quantumguard.com", "Viewer Only", "viewer"),
    ];
    for (email, name, role) in users {
        store.upsert_user(email, name, role, "active")?;
    }

    if store.count_indexed_entries()? == 0 {
        let entries = [
            ("Enterprise_Policies_2026.pdf", "PDF", "Enterprise security policies and guidelines..."),
            ("Technical_Documentation.json", "JSON", "{\"version\": \"1.0\", \"docs\": [...]}"),
            ("Financial_Reports_Q1.csv", "CSV", "Q1,Revenue,Expenses\nJan,1000000,750000"),
            ("Security_Guidelines.txt", "TXT", "Security guidelines and best practices..."),
            ("API_Documentation.pdf", "PDF", "API documentation and endpoints..."),
        ];
        for (title, entry_type, content) in entries {
            store.insert_entry(title, entry_type, Some(content), None, None)?;
        }
    }

    if store.count_unresolved_anomalies()? == 0 {
        let anomalies = [
            ("critical", "Unauthorized access attempt detected from IP 192.168.1.100", "Auth Gateway", 9),
            ("warning", "Unusual query pattern detected - 500+ requests in 1 minute", "Query Engine", 5),
            ("info", "Scheduled encryption key rotation completed", "Encryption Layer", 1),
            ("warning", "Knowledge base synchronization delayed", "Sync Service", 4),
            ("critical", "Multiple failed login attempts detected", "Auth Service", 8),
        ];
        for (anomaly_type, message, source, severity) in anomalies {
            store.insert_anomaly(anomaly_type, message, source, severity)?;
        }
    }

    if store.count_queries_since(0)? == 0 {
        let queries = [
            ("What are the enterprise security policies?", "Based on the knowledge base, enterprise security policies include...", 95, 5, 234),
            ("Show me Q1 financial data", "Q1 financial data shows revenue of $1M...", 92, 3, 189),
            ("How do I encrypt data using AHE?", "To encrypt data using AHE/HEE algorithm...", 96, 7, 312),
        ];
        for (query, response, confidence, result_count, processing_time) in queries {
            store.insert_query_log(query, response, confidence, result_count, processing_time)?;
        }
    }

    if store.count_encrypt_operations()? == 0 {
        let encryptions = [
            ("encrypt", 1024, 12),
            ("decrypt", 1024, 8),
            ("encrypt", 2048, 18),
            ("encrypt", 512, 6),
        ];
        for (operation, data_size, processing_time) in encryptions {
            store.insert_encryption_log(
                operation,
                quantumguard_core::ALGORITHM_LABEL,
                data_size,
                processing_time,
                true,
            )?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::DashboardSqlite;

    #[test]
    fn seeding_twice_does_not_duplicate() {
        let dir = tempfile::tempdir().unwrap();
        let store = DashboardSqlite::new(dir.path().join("seed.sqlite")).unwrap();

        seed_demo_data(&store).unwrap();
        seed_demo_data(&store).unwrap();

        assert_eq!(store.count_indexed_entries().unwrap(), 5);
        assert_eq!(store.count_unresolved_anomalies().unwrap(), 5);
        assert_eq!(store.count_encrypt_operations().unwrap(), 3);
        let analyst = store
            .upsert_user("analyst@quantumguard.com", "x", "x", "x")
            .unwrap();
        assert_eq!(analyst.role, "analyst");
    }
}
