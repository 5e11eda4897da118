use super::*;

impl Default for ApiConfig {
    fn default() -> Self {
        let mut login_params = BTreeMap::new();
        login_params.insert("format".to_string(), "json".to_string());
        login_params.insert("include".to_string(), "userInfo".to_string());
        login_params.insert("targetEnv".to_string(), "jssdk".to_string());

        Self {
            login_url: "https://login.repsol.es/accounts.login".to_string(),
            api_key: String::new(),
            login_params,
            base_url: "https://areacliente.repsol.es/api".to_string(),
            contracts_path: "/contracts".to_string(),
            house_path: "/houses/{house_id}".to_string(),
            consumption_path: "/houses/{house_id}/products/{contract_id}/costs".to_string(),
            invoices_path: "/houses/{house_id}/products/{contract_id}/invoices".to_string(),
            next_invoice_path: "/houses/{house_id}/products/{contract_id}/nextInvoice"
                .to_string(),
            battery_path: "/houses/{house_id}/products/{contract_id}/virtual-battery/history"
                .to_string(),
            user_agent: format!("repsol-sync/{}", env!("CARGO_PKG_VERSION")),
            request_timeout_secs: 15,
            session_validity_secs: 1800,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            update_interval_secs: 3600,
            retry_interval_secs: 300,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            console_level: None,
            file_level: None,
            file: "/tmp/repsol-sync.log".to_string(),
            backup_count: 5,
            console_output: true,
            json_format: false,
        }
    }
}
