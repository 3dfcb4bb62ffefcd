//! 翻译服务客户端
//!
//! `TranslationClient` 是流水线与远程翻译服务之间的接缝：输入一组有序片段，
//! 返回等长、同序的译文。客户端本身无状态、不做缓存也不重试，
//! 重试策略由调用方决定。

// 标准库导入
use std::time::Duration;

// 第三方crate导入
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

// 本地模块导入
use crate::api_constants::error_messages;
use crate::error::{Result, TranslationError};
use crate::language::{LanguageCode, LanguagePair, SupportedLanguages};

/// 翻译服务抽象
#[async_trait]
pub trait TranslationClient: Send + Sync {
    /// 翻译一组片段
    ///
    /// 返回值与 `fragments` 等长，第 i 个译文对应第 i 个片段。
    async fn translate(
        &self,
        fragments: &[String],
        source: &LanguageCode,
        target: &LanguageCode,
    ) -> Result<Vec<String>>;

    /// 服务名称，用于日志
    fn provider_name(&self) -> &str;
}

/// DeepL 翻译请求
#[derive(Debug, Serialize)]
struct DeepLRequest<'a> {
    text: &'a [String],
    source_lang: String,
    target_lang: String,
    /// 片段是内部HTML，需要让服务保留标签
    tag_handling: &'static str,
}

#[derive(Debug, Deserialize)]
struct DeepLResponse {
    translations: Vec<DeepLTranslation>,
}

#[derive(Debug, Deserialize)]
struct DeepLTranslation {
    text: String,
}

#[derive(Debug, Deserialize)]
struct DeepLErrorBody {
    message: Option<String>,
}

/// DeepL v2 API 客户端
#[derive(Debug, Clone)]
pub struct DeepLClient {
    client: Client,
    api_url: String,
    api_key: String,
    served: Option<SupportedLanguages>,
}

impl DeepLClient {
    /// 创建客户端
    ///
    /// `timeout` 同时作为连接和整个请求的超时上限。
    pub fn new(api_url: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(TranslationError::Configuration {
                field: "api_key".to_string(),
                reason: "API密钥不能为空".to_string(),
            });
        }

        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| TranslationError::Configuration {
                field: "http_client".to_string(),
                reason: format!("创建HTTP客户端失败: {}", e),
            })?;

        Ok(Self {
            client,
            api_url: api_url.to_string(),
            api_key: api_key.to_string(),
            served: None,
        })
    }

    /// 限定客户端服务的语言对，超出范围的请求不会发到远程
    pub fn with_served_languages(mut self, languages: SupportedLanguages) -> Self {
        self.served = Some(languages);
        self
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// 把非成功响应映射为错误
    async fn error_from_response(
        response: reqwest::Response,
        source: &LanguageCode,
        target: &LanguageCode,
    ) -> TranslationError {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|e| format!("<读取响应失败: {}>", e));
        let message = serde_json::from_str::<DeepLErrorBody>(&body)
            .ok()
            .and_then(|b| b.message)
            .unwrap_or(body);

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => TranslationError::RemoteRejected {
                status_code: status.as_u16(),
                message: format!("{}: {}", error_messages::AUTH_ERROR, message),
            },
            StatusCode::TOO_MANY_REQUESTS => TranslationError::RemoteRejected {
                status_code: status.as_u16(),
                message: format!("{}: {}", error_messages::RATE_LIMIT_ERROR, message),
            },
            // DeepL 用 456 表示配额耗尽
            s if s.as_u16() == 456 => TranslationError::RemoteRejected {
                status_code: status.as_u16(),
                message: format!("{}: {}", error_messages::QUOTA_ERROR, message),
            },
            StatusCode::BAD_REQUEST if message.to_lowercase().contains("lang") => {
                TranslationError::LanguageUnsupported {
                    source_lang: source.to_string(),
                    target_lang: target.to_string(),
                }
            }
            s if s.is_client_error() => TranslationError::RemoteRejected {
                status_code: status.as_u16(),
                message,
            },
            _ => TranslationError::RemoteUnavailable {
                message: format!("翻译API返回错误状态 {}: {}", status, message),
                status_code: Some(status.as_u16()),
            },
        }
    }
}

#[async_trait]
impl TranslationClient for DeepLClient {
    async fn translate(
        &self,
        fragments: &[String],
        source: &LanguageCode,
        target: &LanguageCode,
    ) -> Result<Vec<String>> {
        if let Some(served) = &self.served {
            let pair = LanguagePair {
                source: source.clone(),
                target: target.clone(),
            };
            if !served.supports(&pair) {
                return Err(TranslationError::LanguageUnsupported {
                    source_lang: source.to_string(),
                    target_lang: target.to_string(),
                });
            }
        }

        if fragments.is_empty() {
            return Ok(Vec::new());
        }

        let request = DeepLRequest {
            text: fragments,
            source_lang: source.to_api_code(),
            target_lang: target.to_api_code(),
            tag_handling: "html",
        };

        debug!(
            "发送翻译请求: {} 个片段 ({} -> {})",
            fragments.len(),
            source,
            target
        );

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("DeepL-Auth-Key {}", self.api_key))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response, source, target).await);
        }

        let body: DeepLResponse =
            response
                .json()
                .await
                .map_err(|e| TranslationError::RemoteUnavailable {
                    message: format!("解析翻译响应失败: {}", e),
                    status_code: None,
                })?;

        if body.translations.len() != fragments.len() {
            return Err(TranslationError::RemoteUnavailable {
                message: format!(
                    "译文数量与片段数量不一致: 期望 {}，实际 {}",
                    fragments.len(),
                    body.translations.len()
                ),
                status_code: None,
            });
        }

        info!("✅ 翻译完成: {} 个片段", body.translations.len());
        Ok(body.translations.into_iter().map(|t| t.text).collect())
    }

    fn provider_name(&self) -> &str {
        "DeepL"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::{
        matchers::{body_partial_json, header, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    fn lang(code: &str) -> LanguageCode {
        LanguageCode::parse(code).unwrap()
    }

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn client_for(server: &MockServer) -> DeepLClient {
        DeepLClient::new(
            &format!("{}/v2/translate", server.uri()),
            "test-key:fx",
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_empty_api_key_rejected() {
        let result = DeepLClient::new("https://example.com", "  ", Duration::from_secs(1));
        assert!(matches!(
            result,
            Err(TranslationError::Configuration { .. })
        ));
    }

    #[tokio::test]
    async fn test_translate_preserves_order() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v2/translate"))
            .and(header("Authorization", "DeepL-Auth-Key test-key:fx"))
            .and(body_partial_json(json!({
                "text": ["Home", "Welcome", "Body text"],
                "source_lang": "EN",
                "target_lang": "FR",
                "tag_handling": "html"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "translations": [
                    {"detected_source_language": "EN", "text": "Accueil"},
                    {"detected_source_language": "EN", "text": "Bienvenue"},
                    {"detected_source_language": "EN", "text": "Texte du corps"}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let result = client_for(&server)
            .translate(
                &texts(&["Home", "Welcome", "Body text"]),
                &lang("en"),
                &lang("fr"),
            )
            .await
            .unwrap();

        assert_eq!(result, texts(&["Accueil", "Bienvenue", "Texte du corps"]));
    }

    #[tokio::test]
    async fn test_auth_failure_is_rejected() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(403).set_body_json(json!({"message": "Wrong key"})),
            )
            .mount(&server)
            .await;

        let err = client_for(&server)
            .translate(&texts(&["Home"]), &lang("en"), &lang("fr"))
            .await
            .unwrap_err();

        match err {
            TranslationError::RemoteRejected {
                status_code,
                message,
            } => {
                assert_eq!(status_code, 403);
                assert!(message.contains("Wrong key"));
            }
            other => panic!("expected RemoteRejected, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_quota_exceeded_is_rejected() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(456))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .translate(&texts(&["Home"]), &lang("en"), &lang("fr"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            TranslationError::RemoteRejected {
                status_code: 456,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_bad_language_is_unsupported() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(json!({"message": "Value for 'target_lang' not supported."})),
            )
            .mount(&server)
            .await;

        let err = client_for(&server)
            .translate(&texts(&["Home"]), &lang("en"), &lang("xx"))
            .await
            .unwrap_err();

        assert!(matches!(err, TranslationError::LanguageUnsupported { .. }));
    }

    #[tokio::test]
    async fn test_server_error_is_unavailable() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .translate(&texts(&["Home"]), &lang("en"), &lang("fr"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            TranslationError::RemoteUnavailable {
                status_code: Some(503),
                ..
            }
        ));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_short_reply_is_unavailable() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "translations": [{"text": "Accueil"}]
            })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .translate(&texts(&["Home", "Welcome"]), &lang("en"), &lang("fr"))
            .await
            .unwrap_err();

        assert!(matches!(err, TranslationError::RemoteUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_timeout_is_unavailable() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let client = DeepLClient::new(
            &format!("{}/v2/translate", server.uri()),
            "test-key",
            Duration::from_millis(200),
        )
        .unwrap();

        let err = client
            .translate(&texts(&["Home"]), &lang("en"), &lang("fr"))
            .await
            .unwrap_err();

        assert!(matches!(err, TranslationError::RemoteUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_unserved_pair_skips_remote() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = client_for(&server).with_served_languages(SupportedLanguages::default());
        let err = client
            .translate(&texts(&["Home"]), &lang("en"), &lang("de"))
            .await
            .unwrap_err();

        assert!(matches!(err, TranslationError::LanguageUnsupported { .. }));
    }

    #[tokio::test]
    async fn test_empty_input_skips_remote() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let result = client_for(&server)
            .translate(&[], &lang("en"), &lang("fr"))
            .await
            .unwrap();
        assert!(result.is_empty());
    }
}
