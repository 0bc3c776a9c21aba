use crate::elicitation::{selection_message, try_elicit, TargetSelection};
use crate::utils::{
    ClickArgs, ClickKeyArgs, ConnectAdbDeviceArgs, ConnectWindowArgs, ControllerArgs,
    CreateTaskerArgs, InputTextArgs, LoadResourceArgs, OcrArgs, ReleaseHandleArgs, ScrollArgs,
    SelectTargetArgs, SwipeArgs,
};
use maa_core::{AutomationError, Discovery, SessionOrchestrator, TargetKind};
use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo,
};
use rmcp::service::{Peer, RoleServer};
use rmcp::{tool, tool_router, ErrorData as McpError, ServerHandler};
use serde::Serialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Extracts JSON data from Content objects without double serialization
pub fn extract_content_json(content: &Content) -> Result<Value, serde_json::Error> {
    match &content.raw {
        rmcp::model::RawContent::Text(text_content) => {
            if let Ok(parsed_json) = serde_json::from_str::<Value>(&text_content.text) {
                Ok(parsed_json)
            } else {
                Ok(json!({"type": "text", "text": text_content.text}))
            }
        }
        rmcp::model::RawContent::Image(image_content) => Ok(
            json!({"type": "image", "data": image_content.data, "mime_type": image_content.mime_type}),
        ),
        rmcp::model::RawContent::Resource(resource_content) => {
            Ok(json!({"type": "resource", "resource": resource_content}))
        }
        rmcp::model::RawContent::Audio(audio_content) => Ok(
            json!({"type": "audio", "data": audio_content.data, "mime_type": audio_content.mime_type}),
        ),
        rmcp::model::RawContent::ResourceLink(resource_link) => {
            Ok(json!({"type": "resource_link", "resource": resource_link}))
        }
    }
}

fn json_result(value: impl Serialize) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::success(vec![Content::json(value)?]))
}

/// The value on success, `None` (serialized as `null`) after logging the failure
fn or_null<T: Serialize>(tool: &str, result: Result<T, AutomationError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(tool, error_kind = e.kind(), "{}", e);
            None
        }
    }
}

/// `true` on success, `false` after logging the failure
fn or_false(tool: &str, result: Result<(), AutomationError>) -> Value {
    match result {
        Ok(()) => Value::Bool(true),
        Err(e) => {
            warn!(tool, error_kind = e.kind(), "{}", e);
            Value::Bool(false)
        }
    }
}

#[derive(Clone)]
pub struct MaaServer {
    session: Arc<SessionOrchestrator>,
    tool_router: ToolRouter<Self>,
}

impl MaaServer {
    pub fn new(session: Arc<SessionOrchestrator>) -> Self {
        Self {
            session,
            tool_router: Self::tool_router(),
        }
    }

    pub fn session(&self) -> &Arc<SessionOrchestrator> {
        &self.session
    }

    /// Run a discovery and, when it is ambiguous, ask the human to choose
    pub async fn discover(&self, kind: TargetKind, peer: Option<&Peer<RoleServer>>) -> Value {
        let discovery = match kind {
            TargetKind::AdbDevice => self.session.find_adb_devices().await,
            TargetKind::Window => self.session.find_windows().await,
        };

        if let (Discovery::SelectionRequired { candidates }, Some(peer)) = (&discovery, peer) {
            let message = selection_message(&kind.to_string(), candidates);
            if let Some(choice) = try_elicit::<TargetSelection>(peer, &message).await {
                if let Err(e) = self.session.select_target(kind, choice.name.trim()) {
                    warn!("Ignoring elicited selection '{}': {}", choice.name, e);
                }
            }
        }

        let selected = self.session.selected(kind);
        json!({
            "names": discovery.names(),
            "selection_required": discovery.selection_required() && selected.is_none(),
            "selected": selected,
        })
    }
}

#[tool_router]
impl MaaServer {
    #[tool(
        description = "Scans for ADB devices (emulators and phones) and returns their names. If more than one name is returned, STOP and let the user choose; never pick a device yourself. Report the choice with select_target."
    )]
    pub async fn find_adb_device_list(
        &self,
        peer: Peer<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        json_result(self.discover(TargetKind::AdbDevice, Some(&peer)).await)
    }

    #[tool(
        description = "Scans for titled desktop windows and returns their names. If more than one name is returned, STOP and let the user choose; never pick a window yourself. Report the choice with select_target."
    )]
    pub async fn find_window_list(
        &self,
        peer: Peer<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        json_result(self.discover(TargetKind::Window, Some(&peer)).await)
    }

    #[tool(
        description = "Records the user's choice after a discovery returned several names. kind is adb_device or window; name must be one of the listed names. Returns true or false."
    )]
    pub async fn select_target(
        &self,
        Parameters(args): Parameters<SelectTargetArgs>,
    ) -> Result<CallToolResult, McpError> {
        let result = self.session.select_target(args.kind.into(), &args.name);
        json_result(or_false("select_target", result))
    }

    #[tool(
        description = "Connects to an ADB device found by find_adb_device_list. Returns a controller ID used by click, swipe, screencap and the other device tools, or null on failure."
    )]
    pub async fn connect_adb_device(
        &self,
        Parameters(args): Parameters<ConnectAdbDeviceArgs>,
    ) -> Result<CallToolResult, McpError> {
        let result = self.session.connect_adb_device(&args.device_name).await;
        json_result(or_null("connect_adb_device", result))
    }

    #[tool(
        description = "Connects to a desktop window found by find_window_list. Optional screencap_method (print_window, monitor_crop) and input_method (post_message, post_message_with_cursor_pos). Returns a controller ID or null on failure."
    )]
    pub async fn connect_window(
        &self,
        Parameters(args): Parameters<ConnectWindowArgs>,
    ) -> Result<CallToolResult, McpError> {
        let result = self
            .session
            .connect_window(
                &args.window_name,
                args.screencap_method.unwrap_or_default().into(),
                args.input_method.unwrap_or_default().into(),
            )
            .await;
        json_result(or_null("connect_window", result))
    }

    #[tool(
        description = "Loads a resource bundle (OCR models). resource_path is the bundle root containing model/ocr. Returns a resource ID, or null if the path does not exist or loading failed."
    )]
    pub async fn load_resource(
        &self,
        Parameters(args): Parameters<LoadResourceArgs>,
    ) -> Result<CallToolResult, McpError> {
        let result = self
            .session
            .load_resource(&PathBuf::from(&args.resource_path))
            .await;
        json_result(or_null("load_resource", result))
    }

    #[tool(
        description = "Binds a controller and a resource into a tasker used for OCR. Returns a tasker ID or null on failure."
    )]
    pub async fn create_tasker(
        &self,
        Parameters(args): Parameters<CreateTaskerArgs>,
    ) -> Result<CallToolResult, McpError> {
        let result = self
            .session
            .create_tasker(&args.controller_id, &args.resource_id)
            .await;
        json_result(or_null("create_tasker", result))
    }

    #[tool(
        description = "Captures the screen and recognizes text. Returns a list of {text, box: [x, y, width, height], score}, or null on failure. Optional roi, expected substrings and threshold (default 0.3) filter the result. Prefer this over screencap."
    )]
    pub async fn ocr(
        &self,
        Parameters(args): Parameters<OcrArgs>,
    ) -> Result<CallToolResult, McpError> {
        let result = self.session.ocr(&args.tasker_id, args.params()).await;
        json_result(or_null("ocr", result))
    }

    #[tool(
        description = "Captures the screen to a PNG file and returns its absolute path (read the file to view it), or null on failure. Images are expensive; use only when ocr is not enough."
    )]
    pub async fn screencap(
        &self,
        Parameters(args): Parameters<ControllerArgs>,
    ) -> Result<CallToolResult, McpError> {
        let result = self.session.screencap(&args.controller_id).await;
        json_result(or_null("screencap", result))
    }

    #[tool(
        description = "Clicks (taps) at pixel coordinates, origin at the top-left corner. Returns true or false."
    )]
    pub async fn click(
        &self,
        Parameters(args): Parameters<ClickArgs>,
    ) -> Result<CallToolResult, McpError> {
        let result = self.session.click(&args.controller_id, args.x, args.y).await;
        json_result(or_false("click", result))
    }

    #[tool(
        description = "Swipes from (start_x, start_y) to (end_x, end_y) over duration milliseconds. Longer durations swipe slower. Returns true or false."
    )]
    pub async fn swipe(
        &self,
        Parameters(args): Parameters<SwipeArgs>,
    ) -> Result<CallToolResult, McpError> {
        let result = self
            .session
            .swipe(
                &args.controller_id,
                (args.start_x, args.start_y),
                (args.end_x, args.end_y),
                args.duration,
            )
            .await;
        json_result(or_false("swipe", result))
    }

    #[tool(description = "Types text into the focused input. Returns true or false.")]
    pub async fn input_text(
        &self,
        Parameters(args): Parameters<InputTextArgs>,
    ) -> Result<CallToolResult, McpError> {
        let result = self
            .session
            .input_text(&args.controller_id, &args.text)
            .await;
        json_result(or_false("input_text", result))
    }

    #[tool(
        description = "Presses a key: an Android keycode for devices (e.g. 4 = BACK, 3 = HOME) or a virtual-key code for windows (e.g. 13 = ENTER). Returns true or false."
    )]
    pub async fn click_key(
        &self,
        Parameters(args): Parameters<ClickKeyArgs>,
    ) -> Result<CallToolResult, McpError> {
        let result = self.session.click_key(&args.controller_id, args.key).await;
        json_result(or_false("click_key", result))
    }

    #[tool(
        description = "Scrolls the mouse wheel in a window controller. x and y are wheel deltas (120 per notch, positive y scrolls up). Not available for ADB devices. Returns true or false."
    )]
    pub async fn scroll(
        &self,
        Parameters(args): Parameters<ScrollArgs>,
    ) -> Result<CallToolResult, McpError> {
        let result = self.session.scroll(&args.controller_id, args.x, args.y).await;
        json_result(or_false("scroll", result))
    }

    #[tool(
        description = "Disconnects a controller and releases the taskers bound to it. Returns true or false."
    )]
    pub async fn disconnect(
        &self,
        Parameters(args): Parameters<ControllerArgs>,
    ) -> Result<CallToolResult, McpError> {
        let result = self.session.disconnect(&args.controller_id);
        json_result(or_false("disconnect", result))
    }

    #[tool(description = "Releases any ID issued by this server. Returns true if it existed.")]
    pub async fn release_handle(
        &self,
        Parameters(args): Parameters<ReleaseHandleArgs>,
    ) -> Result<CallToolResult, McpError> {
        json_result(self.session.release(&args.handle))
    }

    #[tool(description = "Lists every live ID with the kind of object behind it. Read-only.")]
    pub async fn list_handles(&self) -> Result<CallToolResult, McpError> {
        json_result(self.session.handles())
    }
}

impl ServerHandler for MaaServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(crate::prompt::get_server_instructions()),
        }
    }

    async fn call_tool(
        &self,
        request: rmcp::model::CallToolRequestParam,
        context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        use rmcp::handler::server::tool::ToolCallContext;

        let tool_name = request.name.to_string();
        let arguments = request
            .arguments
            .as_ref()
            .map(|a| Value::Object(a.clone()))
            .unwrap_or(Value::Null);
        info!(tool = %tool_name, %arguments, "Tool call");
        let start_time = std::time::Instant::now();

        let tcc = ToolCallContext::new(self, request, context);
        let result = self.tool_router.call(tcc).await;

        let duration_ms = start_time.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => info!(tool = %tool_name, duration_ms, "Tool call finished"),
            Err(e) => warn!(tool = %tool_name, duration_ms, "Tool call failed: {:?}", e),
        }
        result
    }

    async fn list_tools(
        &self,
        _request: Option<rmcp::model::PaginatedRequestParam>,
        _context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> Result<rmcp::model::ListToolsResult, McpError> {
        Ok(rmcp::model::ListToolsResult::with_all_items(
            self.tool_router.list_all(),
        ))
    }
}
