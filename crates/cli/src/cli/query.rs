//! `monkai-trace query-records` / `query-logs`: print stored rows as JSON.

use mt_client::{IngestApi, LogQuery, RecordQuery};

use super::{LogQueryArgs, RecordQueryArgs};

impl RecordQueryArgs {
    pub fn into_query(self, default_namespace: &str) -> RecordQuery {
        RecordQuery {
            limit: self.limit,
            offset: self.offset,
            agent: self.agent,
            session_id: self.session_id,
            start_date: self.start_date,
            end_date: self.end_date,
            ..RecordQuery::new(self.namespace.unwrap_or_else(|| default_namespace.to_owned()))
        }
    }
}

impl LogQueryArgs {
    pub fn into_query(self, default_namespace: &str) -> LogQuery {
        LogQuery {
            limit: self.limit,
            offset: self.offset,
            level: self.level,
            resource_id: self.resource_id,
            start_date: self.start_date,
            end_date: self.end_date,
            ..LogQuery::new(self.namespace.unwrap_or_else(|| default_namespace.to_owned()))
        }
    }
}

pub async fn records(api: &dyn IngestApi, query: RecordQuery) -> anyhow::Result<()> {
    let resp = api.query_records(&query).await?;
    tracing::info!(
        namespace = %query.namespace,
        returned = resp.records.len(),
        count = ?resp.count,
        "record query"
    );
    println!("{}", serde_json::to_string_pretty(&resp)?);
    Ok(())
}

pub async fn logs(api: &dyn IngestApi, query: LogQuery) -> anyhow::Result<()> {
    let resp = api.query_logs(&query).await?;
    tracing::info!(
        namespace = %query.namespace,
        returned = resp.logs.len(),
        count = ?resp.count,
        "log query"
    );
    println!("{}", serde_json::to_string_pretty(&resp)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mt_domain::records::LogLevel;

    #[test]
    fn record_args_fall_back_to_default_namespace() {
        let args = RecordQueryArgs {
            namespace: None,
            agent: Some("triage".into()),
            session_id: None,
            start_date: None,
            end_date: None,
            limit: 5,
            offset: 10,
        };
        let query = args.into_query("support");
        assert_eq!(query.namespace, "support");
        assert_eq!(query.agent.as_deref(), Some("triage"));
        assert_eq!((query.limit, query.offset), (5, 10));
    }

    #[test]
    fn log_args_keep_explicit_namespace() {
        let args = LogQueryArgs {
            namespace: Some("billing".into()),
            level: Some(LogLevel::Error),
            resource_id: None,
            start_date: None,
            end_date: None,
            limit: 100,
            offset: 0,
        };
        let query = args.into_query("support");
        assert_eq!(query.namespace, "billing");
        assert_eq!(query.level, Some(LogLevel::Error));
    }
}
