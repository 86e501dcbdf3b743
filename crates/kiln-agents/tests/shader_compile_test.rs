// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Integration tests for shader programs taking the asynchronous compile path.

mod common;

use common::{
    h, reference_and_provide, tick, tick_until_compiled, RecordingUploader, ScriptedCompiler,
    SCENE,
};
use kiln_agents::ResourceUploadAgent;
use kiln_core::{ResourceError, ResourceStatus, ResourceType, UploadConfig};

#[test]
fn test_shader_round_trip_through_the_compiler() {
    // --- 1. ARRANGE ---
    let uploader = RecordingUploader::new().with_async_shaders();
    let device = uploader.log();
    let mut agent = ResourceUploadAgent::new(uploader, UploadConfig::default())
        .with_shader_compiler(ScriptedCompiler::new())
        .unwrap();
    reference_and_provide(&mut agent, h(1), ResourceType::ShaderProgram, 24, SCENE);

    // --- 2. ACT ---
    let first = tick(&mut agent);

    // --- 3. ASSERT ---
    assert_eq!(first.scheduled, 1);
    // Size is only accounted once the compiled shader is on the device.
    assert_eq!(agent.total_uploaded_size(), 0);
    assert!(agent.has_resources_to_be_uploaded());
    assert!(matches!(
        agent.resource_device_handle(h(1)),
        Err(ResourceError::NotUploaded {
            status: ResourceStatus::ScheduledForUpload,
            ..
        })
    ));

    let status = tick_until_compiled(&mut agent, h(1));

    assert_eq!(status, Some(ResourceStatus::Uploaded));
    assert!(agent.resource_device_handle(h(1)).is_ok());
    assert_eq!(agent.total_uploaded_size(), 24);
    assert!(!agent.has_resources_to_be_uploaded());

    let log = device.lock().unwrap();
    assert_eq!(log.registered_shaders, vec![h(1)]);
    assert_eq!(log.cached_shaders, vec![(h(1), Some(SCENE))]);
    drop(log);

    let stats = agent.statistics().snapshot();
    assert_eq!(stats.shaders_compiled, 1);
    assert_eq!(stats.resources_uploaded, 1);
}

#[test]
fn test_failed_compile_breaks_the_shader() {
    let uploader = RecordingUploader::new().with_async_shaders();
    let device = uploader.log();
    let mut agent = ResourceUploadAgent::new(uploader, UploadConfig::default())
        .with_shader_compiler(ScriptedCompiler::new().failing(h(1)))
        .unwrap();
    reference_and_provide(&mut agent, h(1), ResourceType::ShaderProgram, 24, SCENE);

    let status = tick_until_compiled(&mut agent, h(1));

    assert_eq!(status, Some(ResourceStatus::Broken));
    assert_eq!(agent.resource_device_handle(h(1)), Err(ResourceError::Broken(h(1))));
    assert!(device.lock().unwrap().registered_shaders.is_empty());
    assert_eq!(agent.statistics().snapshot().resources_broken, 1);
}

#[test]
fn test_device_rejecting_compiled_shader_breaks_it() {
    let uploader = RecordingUploader::new().with_async_shaders();
    let mut agent = ResourceUploadAgent::new(uploader, UploadConfig::default())
        .with_shader_compiler(ScriptedCompiler::new())
        .unwrap();
    // The recording device refuses empty binaries.
    reference_and_provide(&mut agent, h(1), ResourceType::ShaderProgram, 0, SCENE);

    assert_eq!(
        tick_until_compiled(&mut agent, h(1)),
        Some(ResourceStatus::Broken)
    );
}

#[test]
fn test_shader_released_while_compiling_stays_until_compiled() {
    // --- 1. ARRANGE ---
    let uploader = RecordingUploader::new().with_async_shaders();
    let device = uploader.log();
    let mut agent = ResourceUploadAgent::new(uploader, UploadConfig::default())
        .with_shader_compiler(ScriptedCompiler::new())
        .unwrap();
    reference_and_provide(&mut agent, h(1), ResourceType::ShaderProgram, 24, SCENE);
    tick(&mut agent);

    // --- 2. ACT ---
    agent.unreference_all_resources_for_scene(SCENE);

    // --- 3. ASSERT ---
    // In-flight compiles cannot be cancelled, so the resource stays registered.
    assert_eq!(
        agent.resource_status(h(1)),
        Some(ResourceStatus::ScheduledForUpload)
    );
    assert_eq!(
        agent.registry().all_resources_not_in_use_by_scenes().to_vec(),
        vec![h(1)]
    );

    assert_eq!(
        tick_until_compiled(&mut agent, h(1)),
        Some(ResourceStatus::Uploaded)
    );
    // Released before it compiled, so there was no scene to cache the binary for.
    assert_eq!(device.lock().unwrap().cached_shaders, vec![(h(1), None)]);

    drop(agent);
    assert_eq!(device.lock().unwrap().unloaded, vec![h(1)]);
}

#[test]
fn test_shaders_and_buffers_upload_in_the_same_tick() {
    let uploader = RecordingUploader::new().with_async_shaders();
    let mut agent = ResourceUploadAgent::new(uploader, UploadConfig::default())
        .with_shader_compiler(ScriptedCompiler::new())
        .unwrap();
    reference_and_provide(&mut agent, h(1), ResourceType::ShaderProgram, 16, SCENE);
    reference_and_provide(&mut agent, h(2), ResourceType::VertexBuffer, 16, SCENE);

    let summary = tick(&mut agent);

    assert_eq!(summary.scheduled, 1);
    assert_eq!(summary.uploaded, 1);
    assert_eq!(agent.resource_status(h(2)), Some(ResourceStatus::Uploaded));
    assert_eq!(
        tick_until_compiled(&mut agent, h(1)),
        Some(ResourceStatus::Uploaded)
    );
    assert_eq!(agent.total_uploaded_size(), 32);
}

#[test]
fn test_full_compile_queue_leaves_shaders_provided() {
    // --- 1. ARRANGE ---
    let config = UploadConfig {
        shader_queue_capacity: 1,
        ..Default::default()
    };
    let uploader = RecordingUploader::new().with_async_shaders();
    let mut agent = ResourceUploadAgent::new(uploader, config)
        .with_shader_compiler(ScriptedCompiler::new())
        .unwrap();
    for n in 1..=3 {
        reference_and_provide(&mut agent, h(n), ResourceType::ShaderProgram, 16, SCENE);
    }

    // --- 2. ACT ---
    let first = tick(&mut agent);

    // --- 3. ASSERT ---
    assert_eq!(first.scheduled, 1);
    assert_eq!(first.deferred, 2);
    assert_eq!(
        agent.resource_status(h(1)),
        Some(ResourceStatus::ScheduledForUpload)
    );
    assert_eq!(agent.resource_status(h(2)), Some(ResourceStatus::Provided));
    assert_eq!(agent.resource_status(h(3)), Some(ResourceStatus::Provided));

    // The queued shaders go through one at a time, oldest first.
    for n in 1..=3 {
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while agent.resource_status(h(n)) != Some(ResourceStatus::Uploaded) {
            assert!(std::time::Instant::now() < deadline, "shader {n} never compiled");
            tick(&mut agent);
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
    }
    assert_eq!(agent.total_uploaded_size(), 48);
    assert!(!agent.has_resources_to_be_uploaded());
}
