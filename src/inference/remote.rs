// 该文件是 EdgeDemo 项目的一部分。
// src/inference/remote.rs - 远程视觉大模型接口
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::io::Cursor;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use image::{ImageFormat, RgbImage};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use super::{Dispatch, InferenceError, InferenceRequest};

pub const REMOTE_SYSTEM_PROMPT: &str = "You are an assistant that classifies emotions in faces.";
pub const REMOTE_QUESTION: &str = "Does this person look happy or sad?";

const CHAT_COMPLETIONS_PATH: &str = "chat/completions";

#[derive(Serialize, Debug)]
struct ChatRequest<'a> {
  model: &'a str,
  messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize, Debug)]
struct ChatMessage<'a> {
  role: &'a str,
  content: MessageContent<'a>,
}

#[derive(Serialize, Debug)]
#[serde(untagged)]
enum MessageContent<'a> {
  Text(&'a str),
  Parts(Vec<ContentPart<'a>>),
}

#[derive(Serialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
  Text { text: &'a str },
  ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize, Debug)]
struct ImageUrl {
  url: String,
}

#[derive(Deserialize, Debug)]
struct ChatResponse {
  choices: Vec<Choice>,
}

#[derive(Deserialize, Debug)]
struct Choice {
  message: ResponseMessage,
}

#[derive(Deserialize, Debug)]
struct ResponseMessage {
  content: Option<String>,
}

/// 将图像编码为 base64 PNG
pub fn encode_png_base64(image: &RgbImage) -> Result<String, image::ImageError> {
  let mut buffer = Cursor::new(Vec::new());
  image.write_to(&mut buffer, ImageFormat::Png)?;
  Ok(STANDARD.encode(buffer.into_inner()))
}

fn build_request<'a>(model: &'a str, question: &'a str, data_url: String) -> ChatRequest<'a> {
  ChatRequest {
    model,
    messages: vec![
      ChatMessage {
        role: "system",
        content: MessageContent::Text(REMOTE_SYSTEM_PROMPT),
      },
      ChatMessage {
        role: "user",
        content: MessageContent::Parts(vec![
          ContentPart::Text { text: question },
          ContentPart::ImageUrl {
            image_url: ImageUrl { url: data_url },
          },
        ]),
      },
    ],
  }
}

/// 兼容 OpenAI chat completions 的视觉模型客户端
pub struct VisionClient {
  client: reqwest::blocking::Client,
  endpoint: Url,
  model: String,
  api_key: String,
}

impl VisionClient {
  pub fn new(
    base_url: &str,
    model: impl Into<String>,
    api_key: Option<String>,
  ) -> Result<Self, InferenceError> {
    let api_key = api_key
      .filter(|key| !key.is_empty())
      .ok_or(InferenceError::MissingApiKey)?;

    let base = if base_url.ends_with('/') {
      Url::parse(base_url)?
    } else {
      Url::parse(&format!("{base_url}/"))?
    };

    Ok(Self {
      client: reqwest::blocking::Client::new(),
      endpoint: base.join(CHAT_COMPLETIONS_PATH)?,
      model: model.into(),
      api_key,
    })
  }

  pub fn endpoint(&self) -> &Url {
    &self.endpoint
  }

  /// 对一张图片提问并返回回答
  pub fn describe(&self, image: &RgbImage, question: &str) -> Result<String, InferenceError> {
    let data_url = format!("data:image/png;base64,{}", encode_png_base64(image)?);
    let request = build_request(&self.model, question, data_url);

    debug!(
      "请求 {}，图像 {}x{}",
      self.endpoint,
      image.width(),
      image.height()
    );
    let response: ChatResponse = self
      .client
      .post(self.endpoint.clone())
      .bearer_auth(&self.api_key)
      .json(&request)
      .send()?
      .error_for_status()?
      .json()?;

    response
      .choices
      .into_iter()
      .next()
      .and_then(|choice| choice.message.content)
      .ok_or(InferenceError::EmptyResponse)
  }
}

impl Dispatch for VisionClient {
  fn dispatch(&self, request: &InferenceRequest<'_>) -> Result<Option<String>, InferenceError> {
    let image = request.image.ok_or(InferenceError::MissingImage)?;
    self.describe(image, request.prompt).map(Some)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::crop::Crop;
  use crate::inference::{InferenceDispatcher, Sampling};
  use image::Rgb;
  use std::io::{BufRead, BufReader, Read, Write};
  use std::net::TcpListener;
  use std::sync::mpsc;

  /// 只应答一次的 HTTP 服务，返回地址与收到的请求体
  fn serve_once(status: &'static str, body: &'static str) -> (String, mpsc::Receiver<String>) {
    serve(vec![(status, body)])
  }

  /// 按顺序应答的 HTTP 服务，每个连接只处理一个请求
  fn serve(responses: Vec<(&'static str, &'static str)>) -> (String, mpsc::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let address = format!("http://{}/v1", listener.local_addr().unwrap());
    let (tx, rx) = mpsc::channel();

    std::thread::spawn(move || {
      for (status, body) in responses {
        let (stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream.try_clone().unwrap());

        let mut request_line = String::new();
        reader.read_line(&mut request_line).unwrap();
        let mut content_length = 0;
        loop {
          let mut line = String::new();
          reader.read_line(&mut line).unwrap();
          if line == "\r\n" || line.is_empty() {
            break;
          }
          if let Some((name, value)) = line.split_once(':') {
            if name.eq_ignore_ascii_case("content-length") {
              content_length = value.trim().parse().unwrap();
            }
          }
        }
        let mut request_body = vec![0u8; content_length];
        reader.read_exact(&mut request_body).unwrap();
        tx.send(format!("{}{}", request_line, String::from_utf8(request_body).unwrap()))
          .unwrap();

        let mut stream = stream;
        write!(
          stream,
          "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
          status,
          body.len(),
          body
        )
        .unwrap();
      }
    });

    (address, rx)
  }

  #[test]
  fn test_request_json_shape() {
    let request = build_request("gpt-4o-mini", REMOTE_QUESTION, "data:image/png;base64,AAAA".into());
    let json = serde_json::to_value(&request).unwrap();

    assert_eq!(json["model"], "gpt-4o-mini");
    assert_eq!(json["messages"][0]["role"], "system");
    assert_eq!(json["messages"][0]["content"], REMOTE_SYSTEM_PROMPT);
    assert_eq!(json["messages"][1]["content"][0]["type"], "text");
    assert_eq!(json["messages"][1]["content"][0]["text"], REMOTE_QUESTION);
    assert_eq!(json["messages"][1]["content"][1]["type"], "image_url");
    assert_eq!(
      json["messages"][1]["content"][1]["image_url"]["url"],
      "data:image/png;base64,AAAA"
    );
  }

  #[test]
  fn test_endpoint_join() {
    let with_slash = VisionClient::new("https://api.openai.com/v1/", "m", Some("k".into())).unwrap();
    let without_slash = VisionClient::new("https://api.openai.com/v1", "m", Some("k".into())).unwrap();

    assert_eq!(
      with_slash.endpoint().as_str(),
      "https://api.openai.com/v1/chat/completions"
    );
    assert_eq!(with_slash.endpoint(), without_slash.endpoint());
  }

  #[test]
  fn test_missing_api_key() {
    assert!(matches!(
      VisionClient::new("https://api.openai.com/v1/", "m", None),
      Err(InferenceError::MissingApiKey)
    ));
    assert!(matches!(
      VisionClient::new("https://api.openai.com/v1/", "m", Some(String::new())),
      Err(InferenceError::MissingApiKey)
    ));
  }

  #[test]
  fn test_encode_png_base64() {
    let image = RgbImage::from_pixel(3, 2, Rgb([10, 20, 30]));
    let encoded = encode_png_base64(&image).unwrap();

    let bytes = STANDARD.decode(encoded).unwrap();
    let decoded = image::load_from_memory(&bytes).unwrap().to_rgb8();
    assert_eq!(decoded.dimensions(), (3, 2));
    assert_eq!(decoded.get_pixel(2, 1), &Rgb([10, 20, 30]));
  }

  #[test]
  fn test_describe_against_mock_server() {
    let (address, rx) = serve_once(
      "200 OK",
      r#"{"choices":[{"message":{"role":"assistant","content":"Happy."}}]}"#,
    );
    let client = VisionClient::new(&address, "gpt-4o-mini", Some("secret".into())).unwrap();
    let image = RgbImage::new(4, 4);

    let request = InferenceRequest::text(REMOTE_QUESTION, Sampling::default()).with_image(&image);
    let answer = client.dispatch(&request).unwrap();
    assert_eq!(answer.as_deref(), Some("Happy."));

    let received = rx.recv().unwrap();
    assert!(received.starts_with("POST /v1/chat/completions"));
    assert!(received.contains("data:image/png;base64,"));
    assert!(received.contains(REMOTE_SYSTEM_PROMPT));
  }

  #[test]
  fn test_http_error_propagates() {
    let (address, _rx) = serve_once("500 Internal Server Error", r#"{"error":"boom"}"#);
    let client = VisionClient::new(&address, "gpt-4o-mini", Some("secret".into())).unwrap();

    assert!(matches!(
      client.describe(&RgbImage::new(2, 2), REMOTE_QUESTION),
      Err(InferenceError::Http(_))
    ));
  }

  #[test]
  fn test_answers_before_failure_are_reported() {
    let (address, _rx) = serve(vec![
      (
        "200 OK",
        r#"{"choices":[{"message":{"role":"assistant","content":"Happy."}}]}"#,
      ),
      ("500 Internal Server Error", r#"{"error":"boom"}"#),
    ]);
    let client = VisionClient::new(&address, "gpt-4o-mini", Some("secret".into())).unwrap();
    let dispatcher = InferenceDispatcher::Remote(client);
    let crops: Vec<Crop> = (0..2)
      .map(|i| Crop {
        image: RgbImage::new(4, 4),
        frame_index: i,
        bbox: [0, 0, 4, 4],
      })
      .collect();

    let mut answers = Vec::new();
    let result = dispatcher.dispatch_crops(&crops, "ignored", Sampling::default(), |person, text| {
      answers.push((person, text.to_string()))
    });

    assert!(matches!(result, Err(InferenceError::Http(_))));
    assert_eq!(answers, vec![(1, "Happy.".to_string())]);
  }

  #[test]
  fn test_dispatch_requires_image() {
    let client = VisionClient::new("http://127.0.0.1:9/", "m", Some("k".into())).unwrap();
    let request = InferenceRequest::text(REMOTE_QUESTION, Sampling::default());

    assert!(matches!(
      client.dispatch(&request),
      Err(InferenceError::MissingImage)
    ));
  }
}
