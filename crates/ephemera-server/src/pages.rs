//! HTML pages served around the WebSocket endpoint.
//!
//! Every value interpolated into markup goes through `html_escape`.

use html_escape::{encode_double_quoted_attribute as attr, encode_text as text};

const STYLE: &str = r#"
body { font-family: system-ui, sans-serif; max-width: 40rem; margin: 2rem auto; }
#chat .messages { border: 1px solid #ccc; height: 24rem; overflow-y: auto; padding: 0.5rem; }
.message--system { color: #777; font-style: italic; }
.message__time { color: #999; font-size: 0.8em; }
.message__user { font-weight: bold; }
"#;

const CHAT_SCRIPT: &str = r#"
const chat = document.getElementById("chat");
const messages = document.getElementById(chat.dataset.target);
const params = new URLSearchParams({ room: chat.dataset.room, user: chat.dataset.user });
const scheme = window.location.protocol === "https:" ? "wss" : "ws";
const socket = new WebSocket(`${scheme}://${window.location.host}${chat.dataset.wsPath}?${params}`);

socket.onmessage = (event) => {
  if (event.data.startsWith("<turbo-stream")) {
    const template = document.createElement("template");
    template.innerHTML = event.data;
    const fragment = template.content.querySelector("template");
    if (fragment) messages.append(fragment.content.cloneNode(true));
  } else {
    const payload = JSON.parse(event.data);
    const line = document.createElement("div");
    line.className = payload.system ? "message message--system" : "message";
    if (payload.system) {
      line.innerHTML = payload.message;
    } else {
      line.textContent = `${payload.user}: ${payload.message}`;
    }
    messages.append(line);
  }
  messages.scrollTop = messages.scrollHeight;
};

document.getElementById("message-form").addEventListener("submit", (event) => {
  event.preventDefault();
  const input = event.target.elements.message;
  if (input.value && socket.readyState === WebSocket.OPEN) {
    socket.send(input.value);
    input.value = "";
  }
});
"#;

fn layout(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{}</title>\n<style>{STYLE}</style>\n</head>\n<body>\n{body}\n</body>\n</html>\n",
        text(title)
    )
}

fn join_form_body(room: &str) -> String {
    format!(
        r#"<form method="post" action="/chat/{room}">
<label>Your name <input name="username" required autofocus></label>
<button type="submit">Join</button>
</form>"#,
        room = attr(room)
    )
}

/// Landing page offering a fresh room.
#[must_use]
pub fn landing(room: &str) -> String {
    let body = format!(
        r#"<h1>Ephemera</h1>
<p>Messages are never stored. Share the link to <a href="/chat/{link}">this room</a> to chat.</p>
{form}"#,
        link = attr(room),
        form = join_form_body(room)
    );
    layout("Ephemera", &body)
}

/// Join form for an existing room.
#[must_use]
pub fn join_form(room: &str) -> String {
    let body = format!(
        "<h1>Join {}</h1>\n{}",
        text(room),
        join_form_body(room)
    );
    layout("Join room", &body)
}

/// Form that posts a message, with the sender carried in a hidden field.
#[must_use]
pub fn message_form(room: &str, user: &str) -> String {
    format!(
        r#"<form id="message-form" method="post" action="/chat/{room}/message">
<input type="hidden" name="user" value="{user}">
<input name="message" autocomplete="off" autofocus>
<button type="submit">Send</button>
</form>"#,
        room = attr(room),
        user = attr(user)
    )
}

/// Chat page that opens the WebSocket for `room` as `user`.
#[must_use]
pub fn chat_page(room: &str, user: &str, websocket_path: &str, stream_target: &str) -> String {
    let body = format!(
        r#"<main id="chat" data-room="{room_attr}" data-user="{user_attr}" data-ws-path="{path}" data-target="{target}">
<h1>{room_text}</h1>
<p>Chatting as <strong>{user_text}</strong></p>
<div id="{target}" class="messages"></div>
{form}
</main>
<script>{CHAT_SCRIPT}</script>"#,
        room_attr = attr(room),
        user_attr = attr(user),
        path = attr(websocket_path),
        room_text = text(room),
        user_text = text(user),
        target = attr(stream_target),
        form = message_form(room, user)
    );
    layout(&format!("Ephemera: {room}"), &body)
}
