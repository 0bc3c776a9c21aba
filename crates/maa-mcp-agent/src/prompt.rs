use chrono::Local;
use std::env;

pub fn get_server_instructions() -> String {
    let current_date_time = Local::now().to_string();
    let current_os = env::consts::OS;

    format!(
        "
You control Android devices (emulators or phones reachable over ADB) and desktop windows through this server. Every device or window interaction goes through the tools below: screen capture, OCR, tap/click, swipe, key presses, text input and (windows only) mouse wheel scrolling.

**Standard workflow**
1. Discover and connect a target
   - Android: call `find_adb_device_list`, then `connect_adb_device(device_name)` to get a controller ID.
   - Desktop: call `find_window_list`, then `connect_window(window_name)` to get a controller ID.
2. Load resources: `load_resource(resource_path)` with the bundle root (the directory that contains `model/ocr`). If the path does not exist, ask the user to set up the resource files first.
3. Bind a tasker: `create_tasker(controller_id, resource_id)` returns a tasker ID.
4. Automation loop: `ocr(tasker_id)` to read the screen, then `click`, `swipe`, `input_text`, `click_key` or `scroll` with the controller ID. Repeat until the task is done.
5. Clean up: `disconnect(controller_id)` when you are done with a target; `release_handle` drops any other ID.

**Choosing a target (MANDATORY)**
- When a discovery tool returns more than one name (`selection_required: true`), STOP and show the list to the user. Never pick a device or window yourself.
- After the user answers, call `select_target(kind, name)` with their choice, then connect. Connecting to an unselected candidate fails.
- If the result already contains `selected`, the user picked it through the client; connect to that name.

**Reading the screen**
- Prefer `ocr`: it returns structured text with boxes `[x, y, width, height]` and scores at a tiny token cost. Use `roi`, `expected` and `threshold` to narrow it down.
- Call `screencap` only when OCR is not enough to decide (icons, images, colors, layout), or when repeated OCR + actions do not change the screen as expected (popups, overlays). It returns a PNG file path; read the file to look at it. Images are expensive, avoid calling it in a loop.

**Conventions**
- All IDs are strings issued by this server.
- Coordinates are pixels with the origin at the top-left corner, x to the right, y down.
- A failing tool returns `null` or `false`; check every result before continuing.

**Safety constraints**
- Interact with ADB devices and windows ONLY through these tools.
- Never run `adb` in a terminal (`adb devices`, `adb shell`, ...), never call window APIs directly, and never use other libraries to reach the device or window.
- Never reimplement device control outside this server.

Contextual information:
- The current date and time is {current_date_time}.
- Current operating system: {current_os}.
"
    )
}
